//! Append-only audit log writer with size and age based rotation.

use std::{
    ffi::OsString,
    fs::{self, File, Metadata, OpenOptions},
    io::{Read as _, Seek as _, SeekFrom, Write as _},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use chrono::{
    format::{Item, StrftimeItems},
    DateTime, Duration, Utc,
};
use tracing::{debug, warn};

use super::LineSink;
use crate::{AppError, Result};

/// Number of numbered rotated files kept when no suffix format is configured.
pub const DEFAULT_MAX_FILES: u32 = 7;

/// What, if anything, is written at the top of a newly created log file.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum FileHeader {
    /// Nothing: the first bytes of a new file are the first appended line.
    #[default]
    Suppressed,
    /// A `# Logfile created on ...` comment line.
    Banner,
}

/// When and how the active log file is rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate once the active file is older than this.
    pub max_age: Option<Duration>,
    /// Rotate before an append would push the active file past this many bytes.
    pub max_size: Option<u64>,
    /// `strftime` pattern for rotated file suffixes; numbered suffixes when `None`.
    pub suffix_format: Option<String>,
    /// Rotated files retained under the numbered scheme.
    pub max_files: u32,
    /// Header behaviour for newly created files.
    pub header: FileHeader,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_age: None,
            max_size: None,
            suffix_format: None,
            max_files: DEFAULT_MAX_FILES,
            header: FileHeader::Suppressed,
        }
    }
}

impl RotationPolicy {
    /// A policy that never rotates automatically.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// Set the age threshold.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Set the size threshold in bytes.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Name rotated files with a `strftime` suffix instead of a number.
    #[must_use]
    pub fn with_suffix_format(mut self, suffix_format: impl Into<String>) -> Self {
        self.suffix_format = Some(suffix_format.into());
        self
    }

    /// Set how many numbered rotated files are retained.
    #[must_use]
    pub fn with_max_files(mut self, max_files: u32) -> Self {
        self.max_files = max_files;
        self
    }

    /// Set the header behaviour for new files.
    #[must_use]
    pub fn with_header(mut self, header: FileHeader) -> Self {
        self.header = header;
        self
    }

    /// Check the policy for values that can never work.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for zero thresholds, a zero retention
    /// count, or an unusable suffix format.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == Some(0) {
            return Err(AppError::Config(
                "max_size must be greater than zero".into(),
            ));
        }

        if self.max_age.is_some_and(|age| age <= Duration::zero()) {
            return Err(AppError::Config("max_age must be positive".into()));
        }

        if self.max_files == 0 {
            return Err(AppError::Config(
                "max_files must be greater than zero".into(),
            ));
        }

        if let Some(suffix) = &self.suffix_format {
            validate_suffix_format(suffix)?;
        }

        Ok(())
    }
}

fn validate_suffix_format(suffix: &str) -> Result<()> {
    if suffix.is_empty() {
        return Err(AppError::Config("suffix_format must not be empty".into()));
    }

    if suffix.contains('/') || suffix.contains('\\') {
        return Err(AppError::Config(format!(
            "suffix_format '{suffix}' must not contain path separators"
        )));
    }

    if StrftimeItems::new(suffix).any(|item| matches!(item, Item::Error)) {
        return Err(AppError::Config(format!(
            "suffix_format '{suffix}' is not a valid strftime pattern"
        )));
    }

    Ok(())
}

/// Open file plus the bookkeeping needed for rotation decisions.
struct WriterState {
    file: File,
    size: u64,
    /// Bytes of banner written by this writer; a file holding only these is empty.
    header_len: u64,
    opened_at: DateTime<Utc>,
}

/// An append-only line sink over one file path that rotates by age and size.
///
/// Every append and any rotation it triggers run under one mutex, so an
/// append never lands in a file that is being rotated out. Writers built with
/// [`RotatingWriter::disabled`] have no target and discard every line.
///
/// Before each append the writer checks that its handle still refers to the
/// file at its path and reopens it if another writer has rotated the file
/// away. Two writers sharing a path are still not serialized against each
/// other, so concurrent rotations from both can race.
pub struct RotatingWriter {
    target: Option<PathBuf>,
    policy: RotationPolicy,
    state: Mutex<Option<WriterState>>,
    rotations: AtomicU64,
}

impl RotatingWriter {
    /// Construct a writer for `path`. The file is opened on first append.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `policy` fails validation.
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy) -> Result<Self> {
        Self::from_target(Some(path.into()), policy)
    }

    /// Construct a writer for an optional target; `None` yields a no-op sink.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `policy` fails validation.
    pub fn from_target(target: Option<PathBuf>, policy: RotationPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            target,
            policy,
            state: Mutex::new(None),
            rotations: AtomicU64::new(0),
        })
    }

    /// A writer with no target. Appends succeed and persist nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            target: None,
            policy: RotationPolicy::default(),
            state: Mutex::new(None),
            rotations: AtomicU64::new(0),
        }
    }

    /// Path of the active log file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// The rotation policy in effect.
    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Number of rotations performed by this writer.
    #[must_use]
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Acquire)
    }

    /// Size in bytes of the active file as tracked by this writer.
    ///
    /// Zero until the first append opens the file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the writer mutex is poisoned.
    pub fn current_size(&self) -> Result<u64> {
        let guard = self.lock_state()?;
        Ok(guard.as_ref().map_or(0, |state| state.size))
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, Option<WriterState>>> {
        self.state
            .lock()
            .map_err(|_| AppError::Io("audit writer mutex poisoned".into()))
    }

    fn open(&self, path: &Path, now: DateTime<Utc>) -> Result<WriterState> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| io_error("open", path, &e))?;

        let metadata = file.metadata().map_err(|e| io_error("inspect", path, &e))?;
        let mut size = metadata.len();

        // A line cut short by an earlier failure must not swallow the next one.
        if size > 0 && !ends_with_newline(&file).map_err(|e| io_error("inspect", path, &e))? {
            warn!(path = %path.display(), "audit log ends mid-line, terminating fragment");
            write_line(&mut file, path, b"\n")?;
            size += 1;
        }

        // An existing file has aged since its last write.
        let opened_at = if size == 0 {
            now
        } else {
            metadata.modified().map_or(now, DateTime::<Utc>::from)
        };

        let mut state = WriterState {
            file,
            size,
            header_len: 0,
            opened_at,
        };

        if size == 0 && self.policy.header == FileHeader::Banner {
            let banner = format!(
                "# Logfile created on {} by {}\n",
                now.to_rfc3339(),
                env!("CARGO_PKG_NAME")
            );
            write_line(&mut state.file, path, banner.as_bytes())?;
            state.header_len = byte_len(&banner);
            state.size = state.header_len;
        }

        debug!(path = %path.display(), size, "audit log opened");
        Ok(state)
    }

    fn should_rotate(&self, state: &WriterState, incoming: u64, now: DateTime<Utc>) -> bool {
        if state.size <= state.header_len {
            return false;
        }

        let too_big = self
            .policy
            .max_size
            .is_some_and(|max| state.size.saturating_add(incoming) > max);
        let too_old = self
            .policy
            .max_age
            .is_some_and(|max| now.signed_duration_since(state.opened_at) > max);

        too_big || too_old
    }

    /// Close the active file, move it aside, and open a fresh one at `path`.
    fn rotate(&self, path: &Path, state: WriterState, now: DateTime<Utc>) -> Result<WriterState> {
        let WriterState {
            file, opened_at, ..
        } = state;
        file.sync_all().map_err(|e| io_error("sync", path, &e))?;
        drop(file);

        let rotated = match &self.policy.suffix_format {
            Some(suffix) => timestamped_path(path, &opened_at.format(suffix).to_string()),
            None => {
                self.shift_numbered(path)?;
                suffixed(path, "1")
            }
        };

        fs::rename(path, &rotated).map_err(|e| io_error("rotate", path, &e))?;
        self.rotations.fetch_add(1, Ordering::AcqRel);
        debug!(
            from = %path.display(),
            to = %rotated.display(),
            "audit log rotated"
        );

        self.open(path, now)
    }

    /// Shift `path.N` to `path.N+1`, dropping anything beyond `max_files`.
    fn shift_numbered(&self, path: &Path) -> Result<()> {
        let max = self.policy.max_files;
        let oldest = suffixed(path, &max.to_string());
        if oldest.exists() {
            fs::remove_file(&oldest).map_err(|e| io_error("remove", &oldest, &e))?;
        }

        for n in (1..max).rev() {
            let from = suffixed(path, &n.to_string());
            if from.exists() {
                let to = suffixed(path, &(n + 1).to_string());
                fs::rename(&from, &to).map_err(|e| io_error("shift", &from, &e))?;
            }
        }

        Ok(())
    }
}

impl LineSink for RotatingWriter {
    fn append_at(&self, line: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(path) = self.target.as_deref() else {
            return Ok(());
        };

        let mut guard = self.lock_state()?;
        let mut state = match guard.take() {
            Some(state) if is_current(path, &state) => state,
            Some(stale) => {
                debug!(path = %path.display(), "audit log moved by another writer, reopening");
                drop(stale);
                self.open(path, now)?
            }
            None => self.open(path, now)?,
        };

        let incoming = byte_len(line);
        if self.should_rotate(&state, incoming, now) {
            state = self.rotate(path, state, now)?;
        }

        if let Err(err) = write_line(&mut state.file, path, line.as_bytes()) {
            discard_fragment(&state, path);
            return Err(err);
        }
        state.size = state.size.saturating_add(incoming);
        *guard = Some(state);

        Ok(())
    }
}

fn write_line(file: &mut File, path: &Path, bytes: &[u8]) -> Result<()> {
    file.write_all(bytes)
        .map_err(|e| io_error("write", path, &e))?;
    file.sync_data().map_err(|e| io_error("sync", path, &e))
}

/// Cut the file back to the last complete line after a failed write.
///
/// If truncation fails too, the next [`RotatingWriter::open`] terminates the
/// fragment instead.
fn discard_fragment(state: &WriterState, path: &Path) {
    if let Err(err) = state.file.set_len(state.size) {
        warn!(path = %path.display(), %err, "failed to truncate partial audit line");
    }
}

fn ends_with_newline(mut file: &File) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Whether the open handle still refers to the file at `path`.
fn is_current(path: &Path, state: &WriterState) -> bool {
    match (state.file.metadata(), fs::metadata(path)) {
        (Ok(open), Ok(on_disk)) => same_file(&open, &on_disk),
        _ => false,
    }
}

#[cfg(unix)]
fn same_file(open: &Metadata, on_disk: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    open.dev() == on_disk.dev() && open.ino() == on_disk.ino()
}

// Open files cannot be renamed here, so only a recreated file can differ.
#[cfg(not(unix))]
fn same_file(open: &Metadata, on_disk: &Metadata) -> bool {
    open.len() == on_disk.len()
}

fn byte_len(text: &str) -> u64 {
    u64::try_from(text.len()).unwrap_or(u64::MAX)
}

fn io_error(action: &str, path: &Path, err: &std::io::Error) -> AppError {
    warn!(path = %path.display(), %err, "audit log {action} failed");
    AppError::Io(format!("failed to {action} audit log {}: {err}", path.display()))
}

/// `path` with `.suffix` appended to its file name.
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// First free name among `path.stamp`, `path.stamp.1`, `path.stamp.2`, ...
fn timestamped_path(path: &Path, stamp: &str) -> PathBuf {
    let base = suffixed(path, stamp);
    if !base.exists() {
        return base;
    }

    let mut n = 1u32;
    loop {
        let candidate = suffixed(&base, &n.to_string());
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
