//! Raw artifact: the API response exactly as received.
//!
//! The body is written to `<raw_dir>/raw-views-<year>-<month>-<DD>.txt` and
//! uploaded unchanged to `datalake/raw/<same file name>`. Existing files and
//! objects for the same day are overwritten.

use crate::error::PipelineError;
use crate::storage::{log_bucket_contents, s3_uri, ObjectStore};
use crate::utils::{ensure_dir, write_file};
use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const RAW_PREFIX: &str = "datalake/raw";

/// File name for the raw artifact of `date`.
///
/// The month is not zero-padded but the day is. Files already in the lake
/// use this form, so it is kept as is.
pub fn raw_file_name(date: NaiveDate) -> String {
    format!("raw-views-{}-{}-{:02}.txt", date.year(), date.month(), date.day())
}

/// Object key for a raw artifact file name.
pub fn raw_key(file_name: &str) -> String {
    format!("{RAW_PREFIX}/{file_name}")
}

/// Write `body` verbatim under `raw_dir`, creating the directory if needed.
#[instrument(level = "info", skip_all, fields(date = %date, raw_dir = %raw_dir.display(), bytes = body.len()))]
pub async fn write_raw(raw_dir: &Path, date: NaiveDate, body: &str) -> Result<PathBuf, PipelineError> {
    ensure_dir(raw_dir).await?;
    let path = raw_dir.join(raw_file_name(date));
    write_file(&path, body.as_bytes()).await?;
    info!(path = %path.display(), "Wrote raw response");
    Ok(path)
}

/// Upload a raw artifact and log the bucket contents afterwards.
///
/// Returns the object key on success.
#[instrument(level = "info", skip_all, fields(path = %path.display(), bucket = %store.bucket()))]
pub async fn upload_raw<S: ObjectStore>(store: &S, path: &Path) -> Result<String, PipelineError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::Config(format!("not a file path: {}", path.display())))?;
    let key = raw_key(file_name);

    info!(bucket = %store.bucket(), "Uploading file to bucket");
    store.put_file(&key, path).await?;
    info!(location = %s3_uri(store.bucket(), &key), "Upload successful");

    log_bucket_contents(store).await;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_raw_file_name() {
        assert_eq!(raw_file_name(date(2024, 11, 18)), "raw-views-2024-11-18.txt");
        assert_eq!(raw_file_name(date(2024, 3, 5)), "raw-views-2024-3-05.txt");
    }

    #[test]
    fn test_raw_key() {
        assert_eq!(
            raw_key("raw-views-2024-11-18.txt"),
            "datalake/raw/raw-views-2024-11-18.txt"
        );
    }

    #[tokio::test]
    async fn test_write_raw_is_byte_identical_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let raw_dir = tmp.path().join("data").join("raw-views");
        let body = "{\"items\": [ ]}\n  trailing whitespace é ";

        let path = write_raw(&raw_dir, date(2024, 11, 18), "older, longer content")
            .await
            .unwrap();
        let again = write_raw(&raw_dir, date(2024, 11, 18), body).await.unwrap();

        assert_eq!(path, again);
        assert_eq!(std::fs::read(&path).unwrap(), body.as_bytes());
    }

    #[tokio::test]
    async fn test_upload_raw_uses_raw_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_raw(tmp.path(), date(2024, 11, 18), "body").await.unwrap();
        let store = MemoryStore::default();

        let key = upload_raw(&store, &path).await.unwrap();

        assert_eq!(key, "datalake/raw/raw-views-2024-11-18.txt");
        assert_eq!(store.object(&key).unwrap(), b"body");
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_upload_raw_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_raw(tmp.path(), date(2024, 11, 18), "body").await.unwrap();
        let store = MemoryStore {
            fail_put: true,
            ..Default::default()
        };

        assert!(matches!(
            upload_raw(&store, &path).await,
            Err(PipelineError::Storage { .. })
        ));
        assert_eq!(store.list_calls(), 0);
    }
}
