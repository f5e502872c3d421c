//! Processed artifact: one JSON object per article, one article per line.
//!
//! The lines are written in the layout our Athena tables were created
//! against: keys in the order `article, views, rank, date, retrieved_at`,
//! `", "` between members, `": "` after keys, non-ASCII escaped as `\uXXXX`,
//! and a newline after every record (including the last). No enclosing
//! array.

use crate::error::PipelineError;
use crate::models::{ApiArticle, ArticleRecord, TopResponse};
use crate::storage::{s3_uri, ObjectStore};
use crate::utils::{ensure_dir, write_file};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

pub const VIEWS_PREFIX: &str = "datalake/views";

/// File name for the processed artifact of `date`.
pub fn views_file_name(date: NaiveDate) -> String {
    format!("views-{}.json", date.format("%Y-%m-%d"))
}

/// Object key for a processed artifact file name.
pub fn views_key(file_name: &str) -> String {
    format!("{VIEWS_PREFIX}/{file_name}")
}

/// Extract `items[0].articles` from a raw API body.
///
/// Any other shape, including the API's own error documents, is a
/// [`PipelineError::MalformedPayload`].
pub fn parse_articles(body: &str, date: NaiveDate) -> Result<Vec<ApiArticle>, PipelineError> {
    let response: TopResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;
    let item = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::MalformedPayload("response has no items".to_string()))?;

    if let (Some(y), Some(m), Some(d)) = (&item.year, &item.month, &item.day) {
        let embedded = format!("{y}-{m}-{d}");
        if embedded != date.format("%Y-%m-%d").to_string() {
            warn!(%date, %embedded, "Payload date differs from requested date; using requested date");
        }
    }

    Ok(item.articles)
}

/// Turn API articles into records stamped with the requested day and a
/// single retrieval time.
pub fn build_records(
    articles: &[ApiArticle],
    date: NaiveDate,
    retrieved_at: &str,
) -> Vec<ArticleRecord> {
    let date = date.format("%Y-%m-%d").to_string();
    articles
        .iter()
        .map(|a| ArticleRecord {
            article: a.article.clone(),
            views: a.views,
            rank: a.rank,
            date: date.clone(),
            retrieved_at: retrieved_at.to_string(),
        })
        .collect()
}

/// JSON formatter producing `{"a": 1, "b": [1, 2]}` with printable-ASCII-only
/// output. DEL and everything above it is written as `\uXXXX`.
#[derive(Debug, Default, Clone, Copy)]
struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.bytes().all(|b| (b' '..=b'~').contains(&b)) {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if (' '..='~').contains(&c) {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    writer.write_all(format!("\\u{:04x}", unit).as_bytes())?;
                }
            }
        }
        Ok(())
    }
}

/// Serialize one value on a single line with [`SpacedAsciiFormatter`].
fn to_json_line<T: Serialize>(value: &T) -> Result<String, PipelineError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedAsciiFormatter);
    value
        .serialize(&mut ser)
        .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;
    // the formatter only ever emits ASCII
    String::from_utf8(buf).map_err(|e| PipelineError::MalformedPayload(e.to_string()))
}

/// Render records as newline-delimited JSON, newline-terminated.
pub fn to_json_lines(records: &[ArticleRecord]) -> Result<String, PipelineError> {
    let mut out = String::new();
    for record in records {
        out.push_str(&to_json_line(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Write the JSON lines for `date` under `views_dir`.
#[instrument(level = "info", skip_all, fields(date = %date, views_dir = %views_dir.display(), bytes = json_lines.len()))]
pub async fn write_views(
    views_dir: &Path,
    date: NaiveDate,
    json_lines: &str,
) -> Result<PathBuf, PipelineError> {
    ensure_dir(views_dir).await?;
    debug!(%json_lines, "JSON lines");
    let path = views_dir.join(views_file_name(date));
    write_file(&path, json_lines.as_bytes()).await?;
    info!(path = %path.display(), "Wrote JSON lines");
    Ok(path)
}

/// Upload a processed artifact under `datalake/views/`. Returns the key.
#[instrument(level = "info", skip_all, fields(path = %path.display(), bucket = %store.bucket()))]
pub async fn upload_views<S: ObjectStore>(store: &S, path: &Path) -> Result<String, PipelineError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::Config(format!("not a file path: {}", path.display())))?;
    let key = views_key(file_name);
    store.put_file(&key, path).await?;
    info!(location = %s3_uri(store.bucket(), &key), "Uploaded processed data");
    Ok(key)
}
