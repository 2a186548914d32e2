pub mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hook-engine")]
#[command(version, about = "Inspect and validate ledger hooks", long_about = None)]
pub struct Cli {
    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            return Verbosity::Quiet;
        }
        match self.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Trace,
}

impl Verbosity {
    /// Default `EnvFilter` directive when `RUST_LOG` is not set.
    pub fn to_log_level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::Trace => "debug,hook_engine::trace=trace",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a hook's imports, exports and loop guards
    GuardCheck(GuardCheckArgs),

    /// Run the STObject parser over a hex blob
    Sto(StoArgs),

    /// Encode or decode XFL floats
    Xfl(XflArgs),

    /// Print the effective engine configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct GuardCheckArgs {
    /// Path to the WASM module, or `-` for stdin
    pub wasm: PathBuf,
}

#[derive(Args, Debug)]
pub struct StoArgs {
    #[command(subcommand)]
    pub command: StoCommand,
}

#[derive(Subcommand, Debug)]
pub enum StoCommand {
    /// Check that the blob is a well-formed sequence of fields
    Validate {
        /// Serialized object as hex
        hex: String,
    },
    /// Locate a top-level field
    Field {
        hex: String,
        /// Field name (e.g. `Account`) or numeric id (`0x80001`)
        field: String,
    },
    /// Locate an array element
    Array { hex: String, index: u32 },
}

#[derive(Args, Debug)]
pub struct XflArgs {
    #[command(subcommand)]
    pub command: XflCommand,
}

#[derive(Subcommand, Debug)]
pub enum XflCommand {
    /// Build an XFL from mantissa and exponent
    Encode {
        #[arg(allow_negative_numbers = true)]
        mantissa: i64,
        #[arg(allow_negative_numbers = true)]
        exponent: i32,
    },
    /// Show the parts of an XFL given in decimal or `0x` hex
    Decode { xfl: String },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// TOML file to load instead of the defaults
    #[arg(long, env = "HOOK_ENGINE_CONFIG")]
    pub file: Option<PathBuf>,
}
