//! Audit logger configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

use crate::audit::{RotationPolicy, TimezoneMode, DEFAULT_MAX_FILES};
use crate::{AppError, Result};

/// Rotation thresholds and naming for the audit log file.
///
/// With neither `max_age_seconds` nor `max_size_bytes` set the file never
/// rotates on its own.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RotationConfig {
    /// Rotate the active file once it is older than this many seconds.
    #[serde(default)]
    pub max_age_seconds: Option<u64>,
    /// Rotate before the active file would grow past this many bytes.
    #[serde(default)]
    pub max_size_bytes: Option<u64>,
    /// `strftime` suffix for rotated files, e.g. `%Y%m%d`.
    #[serde(default)]
    pub suffix_format: Option<String>,
    /// Numbered rotated files to keep when `suffix_format` is unset.
    #[serde(default = "default_max_files")]
    pub max_files: u32,
}

fn default_max_files() -> u32 {
    DEFAULT_MAX_FILES
}

fn default_timezone() -> String {
    "utc".into()
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: None,
            max_size_bytes: None,
            suffix_format: None,
            max_files: default_max_files(),
        }
    }
}

/// Audit logger configuration parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    /// Log file path. When absent the logger discards every record.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// `utc` or `local`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Rotation settings.
    #[serde(default)]
    pub rotation: RotationConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            timezone: default_timezone(),
            rotation: RotationConfig::default(),
        }
    }
}

impl AuditConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// The configured timezone mode.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `timezone` is neither `utc` nor `local`.
    pub fn timezone_mode(&self) -> Result<TimezoneMode> {
        self.timezone.parse()
    }

    /// Build the rotation policy described by the `[rotation]` table.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if any threshold is out of range or the
    /// suffix format is unusable.
    pub fn rotation_policy(&self) -> Result<RotationPolicy> {
        let rotation = &self.rotation;
        let max_age = rotation
            .max_age_seconds
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .ok_or_else(|| {
                        AppError::Config(format!("max_age_seconds {secs} is out of range"))
                    })
            })
            .transpose()?;

        let policy = RotationPolicy {
            max_age,
            max_size: rotation.max_size_bytes,
            suffix_format: rotation.suffix_format.clone(),
            max_files: rotation.max_files,
            ..RotationPolicy::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    fn validate(&self) -> Result<()> {
        self.timezone_mode()?;
        self.rotation_policy()?;

        if self
            .path
            .as_deref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(AppError::Config("path must not be empty".into()));
        }

        Ok(())
    }
}
