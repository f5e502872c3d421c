//! Wikimedia pageview API client.
//!
//! Fetches the "top articles" ranking for one calendar day from
//! `/metrics/pageviews/top/en.wikipedia/all-access/YYYY/MM/DD`.
//!
//! The client makes exactly one GET per run. A non-200 answer is logged as
//! an error and handed back to the caller unchanged; deciding what to do
//! with it belongs to the pipeline, not to this module. There are no
//! retries and no timeout overrides.

use crate::error::PipelineError;
use crate::models::FetchedPage;
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use reqwest::header::USER_AGENT;
use tracing::{debug, error, info, instrument};
use url::Url;

/// A source of daily pageview rankings.
///
/// The production implementation is [`WikimediaClient`]; tests substitute a
/// canned response.
pub trait PageviewSource {
    /// Fetch the raw ranking for `date`.
    async fn fetch(&self, date: NaiveDate) -> Result<FetchedPage, PipelineError>;
}

/// Build the endpoint URL for `date` below `api_base`.
///
/// Month and day are zero-padded, as the API requires.
pub fn pageview_url(api_base: &str, date: NaiveDate) -> Result<Url, PipelineError> {
    let url = format!(
        "{}/metrics/pageviews/top/en.wikipedia/all-access/{}",
        api_base.trim_end_matches('/'),
        date.format("%Y/%m/%d")
    );
    Ok(Url::parse(&url)?)
}

/// HTTP client for the Wikimedia REST API.
#[derive(Debug)]
pub struct WikimediaClient {
    client: reqwest::Client,
    api_base: String,
    user_agent: String,
}

impl WikimediaClient {
    pub fn new(api_base: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            user_agent: user_agent.into(),
        }
    }
}

impl PageviewSource for WikimediaClient {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, date: NaiveDate) -> Result<FetchedPage, PipelineError> {
        let url = pageview_url(&self.api_base, date)?;
        info!(%url, "Requesting REST API URL");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(body = %truncate_for_log(&body, 2000), "Wikipedia REST API response body");
        info!(status, "Wikipedia REST API response code");

        if status != 200 {
            error!(
                status,
                body = %truncate_for_log(&body, 500),
                "Received non-OK status code from Wiki server"
            );
        } else {
            info!(content_length = body.len(), "Successfully retrieved Wikipedia data");
        }

        Ok(FetchedPage {
            url: url.to_string(),
            status,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::Cell;

    /// Answers every request with the same status and body.
    #[derive(Debug)]
    pub struct StaticSource {
        pub status: u16,
        pub body: String,
        pub calls: Cell<usize>,
    }

    impl StaticSource {
        pub fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.to_string(),
                calls: Cell::new(0),
            }
        }
    }

    impl PageviewSource for StaticSource {
        async fn fetch(&self, date: NaiveDate) -> Result<FetchedPage, PipelineError> {
            self.calls.set(self.calls.get() + 1);
            Ok(FetchedPage {
                url: pageview_url("https://wikimedia.org/api/rest_v1", date)?.to_string(),
                status: self.status,
                body: self.body.clone(),
            })
        }
    }
}
