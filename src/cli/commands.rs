use crate::analyzer::{GuardChecker, GuardReport};
use crate::api::ApiError;
use crate::cli::{ConfigArgs, GuardCheckArgs, OutputFormat, StoArgs, StoCommand, XflArgs, XflCommand};
use crate::config::EngineConfig;
use crate::sto::{ops, FieldCode};
use crate::xfl::Xfl;
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Check a hook module against the guard rules.
pub fn guard_check(args: GuardCheckArgs, output: OutputFormat) -> Result<()> {
    let wasm = read_input(&args.wasm)?;
    info!("Checking {} bytes of bytecode", wasm.len());

    let report = GuardChecker::check(&wasm)?;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_guard_report(&report),
    }

    if !report.valid {
        bail!(
            "hook failed the guard check with {} violation(s)",
            report.violations.len()
        );
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read bytecode from stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("Failed to read WASM file: {:?}", path))
}

fn print_guard_report(report: &GuardReport) {
    println!("Imports:  {}", report.imports.join(", "));
    println!("Exports:  {}", report.exports.join(", "));
    println!("Callback: {}", if report.has_callback { "yes" } else { "no" });
    println!("Loops:    {}", report.loops);
    println!("Worst-case guard budget: {}", report.worst_case_guard_budget);

    if report.violations.is_empty() {
        println!("\nGuard check passed.");
        return;
    }
    println!("\nViolations:");
    for violation in &report.violations {
        println!("  {}", violation);
    }
}

#[derive(Serialize)]
struct Location {
    field: Option<String>,
    offset: usize,
    length: usize,
    payload: String,
}

/// Run one of the STObject parser operations over a hex blob.
pub fn sto(args: StoArgs, output: OutputFormat) -> Result<()> {
    match args.command {
        StoCommand::Validate { hex } => {
            let buf = decode_hex(&hex)?;
            let valid = ops::validate(&buf).map_err(api_error)? == 1;
            debug!(len = buf.len(), valid, "sto validate");
            match output {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "valid": valid, "length": buf.len() }))
                }
                OutputFormat::Text => {
                    println!("{}", if valid { "valid" } else { "invalid" })
                }
            }
            if !valid {
                bail!("object is not well formed");
            }
        }
        StoCommand::Field { hex, field } => {
            let buf = decode_hex(&hex)?;
            let code = parse_field(&field)?;
            let packed = ops::subfield(&buf, code.id()).map_err(api_error)?;
            print_location(&buf, packed, Some(code.to_string()), output)?;
        }
        StoCommand::Array { hex, index } => {
            let buf = decode_hex(&hex)?;
            let packed = ops::subarray(&buf, index).map_err(api_error)?;
            print_location(&buf, packed, None, output)?;
        }
    }
    Ok(())
}

fn print_location(
    buf: &[u8],
    packed: i64,
    field: Option<String>,
    output: OutputFormat,
) -> Result<()> {
    let (offset, length) = ops::unpack_location(packed);
    let payload = buf
        .get(offset..offset + length)
        .ok_or_else(|| anyhow!("location {}+{} is outside the object", offset, length))?;
    let location = Location {
        field,
        offset,
        length,
        payload: hex::encode_upper(payload),
    };
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&location)?),
        OutputFormat::Text => {
            if let Some(field) = &location.field {
                println!("Field:   {}", field);
            }
            println!("Offset:  {}", location.offset);
            println!("Length:  {}", location.length);
            println!("Payload: {}", location.payload);
        }
    }
    Ok(())
}

/// Accepts a known field name or a numeric id in decimal or `0x` hex.
fn parse_field(text: &str) -> Result<FieldCode> {
    if let Some(code) = FieldCode::by_name(text) {
        return Ok(code);
    }
    let id = parse_number(text)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| anyhow!("unknown field: {}", text))?;
    Ok(FieldCode::from_id(id))
}

fn parse_number(text: &str) -> Option<i64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => i64::from_str_radix(digits, 16).ok(),
        None => text.parse().ok(),
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    let text = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(text).with_context(|| format!("Invalid hex input: {}", text))
}

fn api_error(err: ApiError) -> anyhow::Error {
    anyhow!("{} ({})", err.name(), err.code())
}

#[derive(Serialize)]
struct XflSummary {
    xfl: i64,
    hex: String,
    mantissa: u64,
    exponent: i32,
    negative: bool,
    approximate: f64,
}

impl XflSummary {
    fn new(value: Xfl) -> Self {
        Self {
            xfl: value.0,
            hex: format!("0x{:016X}", value.0),
            mantissa: value.mantissa(),
            exponent: value.exponent(),
            negative: value.is_negative(),
            approximate: value.to_f64(),
        }
    }
}

/// Encode or decode XFL values.
pub fn xfl(args: XflArgs, output: OutputFormat) -> Result<()> {
    let value = match args.command {
        XflCommand::Encode { mantissa, exponent } => {
            Xfl::from_parts(mantissa, exponent).map_err(api_error)?
        }
        XflCommand::Decode { xfl } => {
            let raw = parse_number(xfl.trim()).ok_or_else(|| anyhow!("not a number: {}", xfl))?;
            let value = Xfl(raw);
            if !value.is_valid() {
                bail!("{} is not a valid XFL", raw);
            }
            value
        }
    };

    let summary = XflSummary::new(value);
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("XFL:      {} ({})", summary.xfl, summary.hex);
            println!("Value:    {}", value);
            println!("Mantissa: {}", summary.mantissa);
            println!("Exponent: {}", summary.exponent);
            println!("Sign:     {}", if summary.negative { "-" } else { "+" });
        }
    }
    Ok(())
}

/// Print the effective configuration.
pub fn config(args: ConfigArgs, output: OutputFormat) -> Result<()> {
    let config = match &args.file {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::new(),
    };
    config.validate()?;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => print!("{}", config.to_toml()?),
    }
    Ok(())
}
