//! Unit tests for `RotatingWriter`.
//!
//! Validates plain appends, header suppression, size- and age-triggered
//! rotation, numbered and timestamped naming, the no-target sink, and
//! surfacing of I/O failures.

use std::fs;
use std::path::{Path, PathBuf};

use audit_loggable::audit::{FileHeader, LineSink, RotatingWriter, RotationPolicy};
use audit_loggable::AppError;
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn log_path(dir: &Path) -> PathBuf {
    dir.join("audit.jsonl")
}

fn rotated(path: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{suffix}", path.display()))
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
        .lines()
        .map(str::to_owned)
        .collect()
}

/// A ten-byte line including its newline.
fn line(n: usize) -> String {
    format!("line-{n:03}\n")
}

#[test]
fn appends_lines_in_order() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let writer = RotatingWriter::new(&path, RotationPolicy::never()).unwrap();

    for n in 0..3 {
        writer.append(&line(n)).unwrap();
    }

    assert_eq!(read_lines(&path), vec!["line-000", "line-001", "line-002"]);
    assert_eq!(writer.rotations(), 0);
    assert_eq!(writer.current_size().unwrap(), 30);
}

#[test]
fn new_file_starts_with_first_line_not_a_header() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let writer = RotatingWriter::new(&path, RotationPolicy::never()).unwrap();

    writer.append("{\"first\":true}\n").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"first\":true}\n");
}

#[test]
fn file_is_not_created_before_first_append() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let writer = RotatingWriter::new(&path, RotationPolicy::never()).unwrap();

    assert!(!path.exists());
    assert_eq!(writer.current_size().unwrap(), 0);
}

#[test]
fn appends_to_existing_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    fs::write(&path, "earlier\n").unwrap();

    let writer = RotatingWriter::new(&path, RotationPolicy::never()).unwrap();
    writer.append("later\n").unwrap();

    assert_eq!(read_lines(&path), vec!["earlier", "later"]);
    assert_eq!(writer.current_size().unwrap(), 14);
}

#[test]
fn size_threshold_rotates_exactly_once_at_boundary() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let writer = RotatingWriter::new(&path, RotationPolicy::never().with_max_size(30)).unwrap();

    for n in 0..3 {
        writer.append(&line(n)).unwrap();
    }
    assert_eq!(writer.rotations(), 0, "filling to exactly max_size must not rotate");

    writer.append(&line(3)).unwrap();

    assert_eq!(writer.rotations(), 1);
    assert_eq!(
        read_lines(&rotated(&path, "1")),
        vec!["line-000", "line-001", "line-002"],
        "rotated-out file keeps every prior line"
    );
    assert_eq!(read_lines(&path), vec!["line-003"]);
}

#[test]
fn rotated_file_starts_with_next_line() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let writer = RotatingWriter::new(&path, RotationPolicy::never().with_max_size(10)).unwrap();

    writer.append(&line(0)).unwrap();
    writer.append(&line(1)).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), line(1));
}

#[test]
fn oversized_line_is_written_to_empty_file_without_rotating() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let writer = RotatingWriter::new(&path, RotationPolicy::never().with_max_size(4)).unwrap();

    writer.append(&line(0)).unwrap();

    assert_eq!(writer.rotations(), 0);
    assert_eq!(read_lines(&path), vec!["line-000"]);
}

#[test]
fn numbered_rotation_keeps_at_most_max_files() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let policy = RotationPolicy::never().with_max_size(10).with_max_files(2);
    let writer = RotatingWriter::new(&path, policy).unwrap();

    for n in 0..5 {
        writer.append(&line(n)).unwrap();
    }

    assert_eq!(writer.rotations(), 4);
    assert_eq!(read_lines(&path), vec!["line-004"]);
    assert_eq!(read_lines(&rotated(&path, "1")), vec!["line-003"]);
    assert_eq!(read_lines(&rotated(&path, "2")), vec!["line-002"]);
    assert!(!rotated(&path, "3").exists(), "files beyond max_files are removed");
}

#[test]
fn age_threshold_rotates_after_max_age() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let policy = RotationPolicy::never().with_max_age(Duration::hours(1));
    let writer = RotatingWriter::new(&path, policy).unwrap();

    writer.append_at(&line(0), t0()).unwrap();
    writer
        .append_at(&line(1), t0() + Duration::minutes(30))
        .unwrap();
    assert_eq!(writer.rotations(), 0);

    writer
        .append_at(&line(2), t0() + Duration::minutes(61))
        .unwrap();

    assert_eq!(writer.rotations(), 1);
    assert_eq!(read_lines(&rotated(&path, "1")), vec!["line-000", "line-001"]);
    assert_eq!(read_lines(&path), vec!["line-002"]);
}

#[test]
fn age_equal_to_max_age_does_not_rotate() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let policy = RotationPolicy::never().with_max_age(Duration::hours(1));
    let writer = RotatingWriter::new(&path, policy).unwrap();

    writer.append_at(&line(0), t0()).unwrap();
    writer.append_at(&line(1), t0() + Duration::hours(1)).unwrap();
    assert_eq!(writer.rotations(), 0, "age must exceed max_age to rotate");

    writer
        .append_at(&line(2), t0() + Duration::hours(1) + Duration::seconds(1))
        .unwrap();
    assert_eq!(writer.rotations(), 1);
    assert_eq!(read_lines(&rotated(&path, "1")), vec!["line-000", "line-001"]);
}

#[test]
fn age_is_measured_from_last_rotation() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let policy = RotationPolicy::never().with_max_age(Duration::hours(1));
    let writer = RotatingWriter::new(&path, policy).unwrap();

    writer.append_at(&line(0), t0()).unwrap();
    writer
        .append_at(&line(1), t0() + Duration::minutes(90))
        .unwrap();
    writer
        .append_at(&line(2), t0() + Duration::minutes(120))
        .unwrap();

    assert_eq!(writer.rotations(), 1, "new file is only 30 minutes old");
    assert_eq!(read_lines(&path), vec!["line-001", "line-002"]);
}

#[test]
fn timestamp_suffix_names_rotated_file_after_period_start() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let policy = RotationPolicy::never()
        .with_max_age(Duration::days(1))
        .with_suffix_format("%Y%m%d");
    let writer = RotatingWriter::new(&path, policy).unwrap();

    writer.append_at(&line(0), t0()).unwrap();
    writer
        .append_at(&line(1), t0() + Duration::days(1) + Duration::seconds(1))
        .unwrap();

    assert_eq!(read_lines(&rotated(&path, "20240101")), vec!["line-000"]);
    assert_eq!(read_lines(&path), vec!["line-001"]);
}

#[test]
fn timestamp_suffix_collisions_get_an_index() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let policy = RotationPolicy::never()
        .with_max_size(10)
        .with_suffix_format("%Y%m%d");
    let writer = RotatingWriter::new(&path, policy).unwrap();

    for n in 0..3 {
        writer.append_at(&line(n), t0()).unwrap();
    }

    assert_eq!(writer.rotations(), 2);
    assert_eq!(read_lines(&rotated(&path, "20240101")), vec!["line-000"]);
    assert_eq!(read_lines(&rotated(&path, "20240101.1")), vec!["line-001"]);
    assert_eq!(read_lines(&path), vec!["line-002"]);
}

#[test]
fn no_thresholds_never_rotate() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let writer = RotatingWriter::new(&path, RotationPolicy::never()).unwrap();

    for n in 0..50 {
        writer
            .append_at(&line(n), t0() + Duration::days(i64::try_from(n).unwrap()))
            .unwrap();
    }

    assert_eq!(writer.rotations(), 0);
    assert_eq!(read_lines(&path).len(), 50);
}

#[test]
fn banner_header_is_opt_in() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let policy = RotationPolicy::never().with_header(FileHeader::Banner);
    let writer = RotatingWriter::new(&path, policy).unwrap();

    writer.append(&line(0)).unwrap();

    let lines = read_lines(&path);
    assert!(lines[0].starts_with("# Logfile created on "), "got {lines:?}");
    assert_eq!(lines[1], "line-000");
}

#[test]
fn banner_only_file_is_not_rotated() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let policy = RotationPolicy::never()
        .with_max_size(10)
        .with_header(FileHeader::Banner);
    let writer = RotatingWriter::new(&path, policy).unwrap();

    writer.append(&line(0)).unwrap();
    assert_eq!(writer.rotations(), 0, "a file holding only the banner counts as empty");

    writer.append(&line(1)).unwrap();
    assert_eq!(writer.rotations(), 1);

    let old = read_lines(&rotated(&path, "1"));
    assert_eq!(old.len(), 2);
    assert_eq!(old[1], "line-000");
    let current = read_lines(&path);
    assert!(current[0].starts_with("# Logfile created on "));
    assert_eq!(current[1], "line-001");
}

#[test]
fn default_policy_suppresses_header() {
    assert_eq!(RotationPolicy::default().header, FileHeader::Suppressed);
}

#[test]
fn writer_without_target_discards_lines() {
    let writer = RotatingWriter::disabled();

    for n in 0..3 {
        writer.append(&line(n)).unwrap();
    }

    assert!(writer.path().is_none());
    assert_eq!(writer.rotations(), 0);
    assert_eq!(writer.current_size().unwrap(), 0);
}

#[test]
fn missing_directory_surfaces_io_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing").join("audit.jsonl");
    let writer = RotatingWriter::new(&path, RotationPolicy::never()).unwrap();

    let result = writer.append(&line(0));

    match result {
        Err(AppError::Io(msg)) => assert!(msg.contains("audit.jsonl"), "got: {msg}"),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn invalid_policy_fails_construction() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());

    let result = RotatingWriter::new(&path, RotationPolicy::never().with_max_size(0));

    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn fragment_from_failed_write_does_not_swallow_next_line() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let good = "{\"n\":1}\n";
    let fragment = "{\"timestamp\":\"2024-01-01T00:";
    fs::write(&path, format!("{good}{fragment}")).unwrap();

    let writer = RotatingWriter::new(&path, RotationPolicy::never()).unwrap();
    writer.append("{\"n\":2}\n").unwrap();

    let lines = read_lines(&path);
    assert_eq!(lines, vec!["{\"n\":1}", fragment, "{\"n\":2}"]);
    let last: serde_json::Value = serde_json::from_str(&lines[2]).unwrap();
    assert_eq!(last, serde_json::json!({"n": 2}));
    assert_eq!(
        writer.current_size().unwrap(),
        u64::try_from(good.len() + fragment.len() + 1 + 8).unwrap()
    );
}

#[cfg(unix)]
#[test]
fn writer_follows_rotation_done_by_another_writer() {
    let temp = tempfile::tempdir().unwrap();
    let path = log_path(temp.path());
    let rotating = RotatingWriter::new(&path, RotationPolicy::never().with_max_size(10)).unwrap();
    let follower = RotatingWriter::new(&path, RotationPolicy::never()).unwrap();

    follower.append(&line(0)).unwrap();
    rotating.append(&line(1)).unwrap();
    assert_eq!(rotating.rotations(), 1);

    follower.append(&line(2)).unwrap();

    assert_eq!(read_lines(&rotated(&path, "1")), vec!["line-000"]);
    assert_eq!(read_lines(&path), vec!["line-001", "line-002"]);
}
