//! Append-only audit trail logging.
//!
//! [`GatedLogger`] is the entry point: it checks an [`AuditSwitch`], renders
//! each record with a [`LineFormatter`], and appends the line through a
//! [`LineSink`]. The file-backed sink is [`RotatingWriter`], which rotates by
//! size and age and never writes a header into a new file unless asked to.

pub mod formatter;
pub mod logger;
pub mod switch;
pub mod writer;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Result;

/// Destination for fully formatted log lines.
///
/// Implementations must be [`Send`] and [`Sync`] so one sink can be shared
/// by concurrent loggers via [`std::sync::Arc`].
pub trait LineSink: Send + Sync {
    /// Append `line`, using `now` for any age-based decisions.
    ///
    /// # Errors
    ///
    /// Returns an error if the line could not be durably appended.
    fn append_at(&self, line: &str, now: DateTime<Utc>) -> Result<()>;

    /// Append `line` at the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the line could not be durably appended.
    fn append(&self, line: &str) -> Result<()> {
        self.append_at(line, Utc::now())
    }
}

impl<T: LineSink + ?Sized> LineSink for Arc<T> {
    fn append_at(&self, line: &str, now: DateTime<Utc>) -> Result<()> {
        (**self).append_at(line, now)
    }
}

pub use formatter::{LineFormatter, TimezoneMode};
pub use logger::GatedLogger;
pub use switch::{auditing_enabled, set_auditing_enabled, AuditSwitch, GlobalSwitch, SharedSwitch};
pub use writer::{FileHeader, RotatingWriter, RotationPolicy, DEFAULT_MAX_FILES};
