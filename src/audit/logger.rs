//! Gated batch logging of audit records.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use super::{
    AuditSwitch, FileHeader, LineFormatter, LineSink, RotatingWriter, RotationPolicy,
    TimezoneMode,
};
use crate::config::AuditConfig;
use crate::{AppError, Result};

/// Formats and appends batches of audit records while the switch is on.
///
/// The logger carries no per-call severity and keeps no records between
/// calls. Every record in a batch is formatted with its own timestamp and
/// appended as soon as it is formatted.
pub struct GatedLogger {
    formatter: LineFormatter,
    sink: Box<dyn LineSink>,
    switch: Arc<dyn AuditSwitch>,
}

impl GatedLogger {
    /// Construct a logger over a rotating file writer.
    ///
    /// `target = None` keeps the API usable while persisting nothing. File
    /// headers are always suppressed, whatever `policy.header` says.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `policy` fails validation.
    pub fn new(
        target: Option<PathBuf>,
        policy: RotationPolicy,
        timezone: TimezoneMode,
        switch: Arc<dyn AuditSwitch>,
    ) -> Result<Self> {
        let policy = RotationPolicy {
            header: FileHeader::Suppressed,
            ..policy
        };
        let writer = RotatingWriter::from_target(target, policy)?;
        Ok(Self::with_sink(LineFormatter::new(timezone), writer, switch))
    }

    /// Construct a logger from parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the timezone or rotation settings are invalid.
    pub fn from_config(config: &AuditConfig, switch: Arc<dyn AuditSwitch>) -> Result<Self> {
        Self::new(
            config.path.clone(),
            config.rotation_policy()?,
            config.timezone_mode()?,
            switch,
        )
    }

    /// Construct a logger over any line sink.
    #[must_use]
    pub fn with_sink(
        formatter: LineFormatter,
        sink: impl LineSink + 'static,
        switch: Arc<dyn AuditSwitch>,
    ) -> Self {
        Self {
            formatter,
            sink: Box::new(sink),
            switch,
        }
    }

    /// The formatter applied to every record.
    #[must_use]
    pub fn formatter(&self) -> &LineFormatter {
        &self.formatter
    }

    /// Append every record in `records`, in order, one line each.
    ///
    /// Returns `Ok(())` without touching the sink when the switch is off.
    /// The first record that fails to format or append stops the batch;
    /// records before it stay written and records after it are not attempted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Incomplete`] naming the failed record.
    pub fn log<I>(&self, records: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Serialize,
    {
        if !self.switch.is_enabled() {
            return Ok(());
        }

        let mut written = 0usize;
        for (index, record) in records.into_iter().enumerate() {
            let now = Utc::now();
            self.formatter
                .format(&now, &record)
                .and_then(|line| self.sink.append_at(&line, now))
                .map_err(|err| {
                    warn!(failed_index = index, %err, "audit batch aborted");
                    AppError::Incomplete {
                        failed_index: index,
                        reason: err.to_string(),
                    }
                })?;
            written += 1;
        }

        debug!(written, "audit batch appended");
        Ok(())
    }
}
