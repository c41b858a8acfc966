//! JSON-line formatting of timestamped audit records.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use serde::Serialize;

use crate::{AppError, Result};

/// Timezone used for the `timestamp` field of every log entry.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum TimezoneMode {
    /// Coordinated Universal Time, serialized with a `Z` suffix.
    #[default]
    Utc,
    /// The host's local zone at write time, serialized with a numeric offset.
    Local,
}

impl FromStr for TimezoneMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("utc") {
            Ok(Self::Utc)
        } else if name.eq_ignore_ascii_case("local") {
            Ok(Self::Local)
        } else {
            Err(AppError::Config(format!(
                "unsupported timezone '{name}', expected 'utc' or 'local'"
            )))
        }
    }
}

impl Display for TimezoneMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utc => f.write_str("utc"),
            Self::Local => f.write_str("local"),
        }
    }
}

/// The on-disk unit: one timestamp and one record.
#[derive(Serialize)]
struct LogEntry<'a, R: ?Sized> {
    timestamp: DateTime<FixedOffset>,
    record: &'a R,
}

/// Turns one timestamped record into one newline-terminated JSON line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LineFormatter {
    timezone: TimezoneMode,
}

impl LineFormatter {
    /// Construct a formatter for a known timezone mode.
    #[must_use]
    pub fn new(timezone: TimezoneMode) -> Self {
        Self { timezone }
    }

    /// Construct a formatter from a timezone name (`utc` or `local`).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for any other name.
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse().map(Self::new)
    }

    /// The configured timezone mode.
    #[must_use]
    pub fn timezone(&self) -> TimezoneMode {
        self.timezone
    }

    /// Render `record` stamped with `instant` as a single JSON line.
    ///
    /// The output is `{"timestamp":...,"record":...}` followed by exactly one
    /// `\n`. The record is embedded verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Serialize`] if `record` cannot be encoded as JSON.
    pub fn format<Tz, R>(&self, instant: &DateTime<Tz>, record: &R) -> Result<String>
    where
        Tz: TimeZone,
        R: Serialize + ?Sized,
    {
        let timestamp = match self.timezone {
            TimezoneMode::Utc => instant.with_timezone(&Utc).fixed_offset(),
            TimezoneMode::Local => instant.with_timezone(&Local).fixed_offset(),
        };

        let mut line = serde_json::to_string(&LogEntry { timestamp, record })?;
        line.push('\n');
        Ok(line)
    }
}
