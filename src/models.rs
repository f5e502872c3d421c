//! Data models for the pageview API payload and the records we publish.
//!
//! This module defines the core data structures used throughout the application:
//! - [`FetchedPage`]: Raw HTTP response for one day, kept verbatim
//! - [`TopResponse`] / [`TopItem`] / [`ApiArticle`]: The subset of the
//!   Wikimedia "top" payload we read
//! - [`ArticleRecord`]: One published JSON line
//!
//! The API payload carries more fields than we model (`project`, `access`,
//! per-article `views_ceil`, ...); serde skips them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The unparsed response of one pageview API request.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested.
    pub url: String,
    /// HTTP status code as returned by the server.
    pub status: u16,
    /// Response body as text, untouched.
    pub body: String,
}

impl FetchedPage {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Top-level shape of `/metrics/pageviews/top/...` responses.
#[derive(Debug, Deserialize)]
pub struct TopResponse {
    pub items: Vec<TopItem>,
}

/// One entry of `items`. The API always returns exactly one per requested day.
#[derive(Debug, Deserialize)]
pub struct TopItem {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
    pub articles: Vec<ApiArticle>,
}

/// A ranked article as published by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiArticle {
    pub article: String,
    pub views: u64,
    pub rank: u32,
}

/// A single line of the processed artifact.
///
/// Field order is the serialization order and must stay stable: downstream
/// tables are defined against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// The article title as used in the Wikipedia URL (underscores, not spaces).
    pub article: String,
    /// Number of views on the requested day.
    pub views: u64,
    /// Position in the day's ranking, starting at 1.
    pub rank: u32,
    /// The requested day as `YYYY-MM-DD`, never the date embedded in the payload.
    pub date: String,
    /// Processing time in UTC without an offset suffix.
    pub retrieved_at: String,
}

/// What a pipeline run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub date: NaiveDate,
    pub status: u16,
    pub raw_path: PathBuf,
    /// `None` when the raw upload failed under [`crate::config::UploadPolicy::Continue`].
    pub raw_key: Option<String>,
    pub views_path: PathBuf,
    /// `None` when the views upload failed under [`crate::config::UploadPolicy::Continue`].
    pub views_key: Option<String>,
    pub record_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_response_ignores_extra_fields() {
        let body = r#"{"items":[{"project":"en.wikipedia","access":"all-access",
            "year":"2024","month":"11","day":"18",
            "articles":[{"article":"Main_Page","views":500000,"rank":1,"views_ceil":500000}]}]}"#;
        let parsed: TopResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].day.as_deref(), Some("18"));
        assert_eq!(parsed.items[0].articles[0].article, "Main_Page");
        assert_eq!(parsed.items[0].articles[0].views, 500000);
    }

    #[test]
    fn test_fetched_page_is_ok() {
        let mut page = FetchedPage {
            url: "https://example.com".to_string(),
            status: 200,
            body: String::new(),
        };
        assert!(page.is_ok());
        page.status = 404;
        assert!(!page.is_ok());
    }
}
