//! Small helpers for logging, timestamps and the local filesystem.

use crate::error::PipelineError;
use chrono::{DateTime, Timelike, Utc};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a char
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Render a UTC instant as a naive ISO-8601 timestamp.
///
/// Athena cannot read offsets, so the `+00:00` suffix is dropped. Fractional
/// seconds are printed with microsecond precision and omitted entirely when
/// zero, e.g. `2024-11-19T08:15:00` or `2024-11-19T08:15:00.123456`.
pub fn naive_utc_timestamp(now: DateTime<Utc>) -> String {
    let naive = now.naive_utc();
    if naive.nanosecond() / 1_000 == 0 {
        naive.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        naive.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Create a directory and its parents; succeeds if it already exists.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    info!(path = %path.display(), "Created directory");
    Ok(())
}

/// Write `contents` to `path`, replacing any existing file.
pub async fn write_file(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    fs::write(path, contents)
        .await
        .map_err(|e| PipelineError::io(path, e))
}
