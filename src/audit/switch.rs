//! The process-wide "auditing enabled" kill switch.
//!
//! The flag is owned by whatever control surface the host application
//! exposes. Loggers only read it, through the [`AuditSwitch`] capability.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

static AUDITING_ENABLED: AtomicBool = AtomicBool::new(true);

/// Whether audit records should currently be written.
pub trait AuditSwitch: Send + Sync {
    /// Return `true` when logging is allowed.
    fn is_enabled(&self) -> bool;
}

/// Read the process-wide flag. Enabled unless turned off.
#[must_use]
pub fn auditing_enabled() -> bool {
    AUDITING_ENABLED.load(Ordering::Acquire)
}

/// Set the process-wide flag.
pub fn set_auditing_enabled(enabled: bool) {
    AUDITING_ENABLED.store(enabled, Ordering::Release);
}

/// [`AuditSwitch`] backed by the process-wide flag.
#[derive(Debug, Copy, Clone, Default)]
pub struct GlobalSwitch;

impl AuditSwitch for GlobalSwitch {
    fn is_enabled(&self) -> bool {
        auditing_enabled()
    }
}

/// [`AuditSwitch`] with its own shared flag, independent of the global one.
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct SharedSwitch {
    flag: Arc<AtomicBool>,
}

impl SharedSwitch {
    /// Create a switch in the given initial state.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(enabled)),
        }
    }

    /// Turn logging on or off for every holder of this switch.
    pub fn set(&self, enabled: bool) {
        self.flag.store(enabled, Ordering::Release);
    }
}

impl Default for SharedSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AuditSwitch for SharedSwitch {
    fn is_enabled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
