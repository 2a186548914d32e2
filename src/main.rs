use anyhow::Result;
use clap::Parser;
use hook_engine::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    // Logs go to stderr so `--output json` keeps stdout machine readable.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.to_log_level()));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let output = cli.output;
    match cli.command {
        Commands::GuardCheck(args) => hook_engine::cli::commands::guard_check(args, output)?,
        Commands::Sto(args) => hook_engine::cli::commands::sto(args, output)?,
        Commands::Xfl(args) => hook_engine::cli::commands::xfl(args, output)?,
        Commands::Config(args) => hook_engine::cli::commands::config(args, output)?,
    }

    Ok(())
}
