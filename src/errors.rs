//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering every audit logging failure mode.
///
/// Disabled auditing is never reported here: a gated `log` call with the
/// switch off returns `Ok(())`.
#[derive(Debug)]
pub enum AppError {
    /// Invalid construction-time configuration (timezone, rotation policy, TOML).
    Config(String),
    /// Opening, appending to, flushing, or rotating the log file failed.
    Io(String),
    /// An audit record could not be encoded as JSON.
    Serialize(String),
    /// A batch stopped at `failed_index`; earlier records were appended.
    Incomplete {
        /// Zero-based position of the record that failed.
        failed_index: usize,
        /// Display form of the underlying failure.
        reason: String,
    },
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Serialize(msg) => write!(f, "serialize: {msg}"),
            Self::Incomplete {
                failed_index,
                reason,
            } => write!(f, "incomplete batch: record {failed_index} failed: {reason}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}
