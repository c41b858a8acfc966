#![forbid(unsafe_code)]

//! Audit-trail logging to a rotating, newline-delimited JSON file.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use audit_loggable::audit::{GatedLogger, GlobalSwitch, RotationPolicy, TimezoneMode};
//!
//! # fn main() -> audit_loggable::Result<()> {
//! let logger = GatedLogger::new(
//!     Some("/var/log/app/audit.jsonl".into()),
//!     RotationPolicy::never().with_max_size(1024 * 1024),
//!     TimezoneMode::Utc,
//!     Arc::new(GlobalSwitch),
//! )?;
//!
//! logger.log([serde_json::json!({"action": "login", "user": 42})])?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod errors;

pub use config::AuditConfig;
pub use errors::{AppError, Result};
