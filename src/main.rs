#![forbid(unsafe_code)]

//! `audit-loggable`: append audit records from stdin to a rotating JSONL log.
//!
//! Reads one JSON value per input line and logs the whole input as a single
//! batch through the configured [`GatedLogger`].

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use audit_loggable::audit::{set_auditing_enabled, GatedLogger, GlobalSwitch};
use audit_loggable::config::AuditConfig;
use audit_loggable::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "audit-loggable", about = "Append audit records to a rotating JSONL log", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Diagnostic output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Turn auditing off for this run; input is read and discarded.
    #[arg(long)]
    disabled: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let config = AuditConfig::load_from_path(&args.config)?;
    set_auditing_enabled(!args.disabled);

    let logger = GatedLogger::from_config(&config, Arc::new(GlobalSwitch))?;
    let records = read_records(io::stdin().lock())?;

    logger.log(&records)?;
    info!(count = records.len(), disabled = args.disabled, "audit records processed");
    Ok(())
}

/// Parse one JSON value per non-blank line.
fn read_records(input: impl BufRead) -> Result<Vec<serde_json::Value>> {
    let mut records = Vec::new();
    for (number, line) in input.lines().enumerate() {
        let line = line.map_err(|err| AppError::Io(format!("failed to read stdin: {err}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|err| {
            AppError::Serialize(format!("input line {}: {err}", number + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
