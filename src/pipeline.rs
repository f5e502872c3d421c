//! The end-to-end run for one day.
//!
//! Stages run strictly one after another:
//!
//! 1. Fetch the ranking from the API
//! 2. Write the raw body locally
//! 3. Provision the bucket (create if absent, then probe)
//! 4. Upload the raw body under `datalake/raw/`
//! 5. Stop with [`PipelineError::UnexpectedStatus`] unless the fetch returned 200
//! 6. Parse, reshape into JSON lines, write locally
//! 7. Upload under `datalake/views/`
//!
//! A non-200 response is still archived (steps 2 to 4) so the error body can
//! be inspected later. Upload failures follow [`UploadPolicy`].

use crate::config::{PipelineConfig, UploadPolicy};
use crate::error::PipelineError;
use crate::fetcher::PageviewSource;
use crate::models::PipelineReport;
use crate::outputs::{raw, views};
use crate::storage::{provision_bucket, ObjectStore};
use crate::utils::naive_utc_timestamp;
use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

/// Apply the upload policy to an upload result.
///
/// Returns `Ok(None)` when the failure is tolerated.
fn settle_upload(
    result: Result<String, PipelineError>,
    policy: UploadPolicy,
    what: &'static str,
) -> Result<Option<String>, PipelineError> {
    match result {
        Ok(key) => Ok(Some(key)),
        Err(e) => match policy {
            UploadPolicy::Abort => {
                error!(artifact = what, error = %e, "Error uploading file; aborting");
                Err(e)
            }
            UploadPolicy::Continue => {
                warn!(artifact = what, error = %e, "Error uploading file; continuing");
                Ok(None)
            }
        },
    }
}

/// Run every stage for `config.date`, stamping records with the wall-clock
/// time of the transform.
pub async fn run<P, S>(
    config: &PipelineConfig,
    source: &P,
    store: &S,
) -> Result<PipelineReport, PipelineError>
where
    P: PageviewSource,
    S: ObjectStore,
{
    run_at(config, source, store, Utc::now).await
}

/// Same as [`run`] with an explicit clock.
///
/// `clock` is read exactly once, right before the records are built.
#[instrument(level = "info", skip_all, fields(date = %config.date, bucket = %store.bucket()))]
pub async fn run_at<P, S, C>(
    config: &PipelineConfig,
    source: &P,
    store: &S,
    clock: C,
) -> Result<PipelineReport, PipelineError>
where
    P: PageviewSource,
    S: ObjectStore,
    C: Fn() -> DateTime<Utc>,
{
    let date = config.date;

    let page = source.fetch(date).await?;

    let raw_path = raw::write_raw(&config.raw_dir(), date, &page.body).await?;

    provision_bucket(store, &config.region).await?;

    let raw_key = settle_upload(
        raw::upload_raw(store, &raw_path).await,
        config.upload_policy,
        "raw",
    )?;

    if !page.is_ok() {
        error!(status = page.status, url = %page.url, "Skipping transform of non-OK response");
        return Err(PipelineError::UnexpectedStatus {
            status: page.status,
        });
    }

    let articles = views::parse_articles(&page.body, date)?;
    let retrieved_at = naive_utc_timestamp(clock());
    let records = views::build_records(&articles, date, &retrieved_at);
    let json_lines = views::to_json_lines(&records)?;
    let views_path = views::write_views(&config.views_dir(), date, &json_lines).await?;

    let views_key = settle_upload(
        views::upload_views(store, &views_path).await,
        config.upload_policy,
        "views",
    )?;

    info!(
        records = records.len(),
        raw_uploaded = raw_key.is_some(),
        views_uploaded = views_key.is_some(),
        "Pipeline finished"
    );

    Ok(PipelineReport {
        date,
        status: page.status,
        raw_path,
        raw_key,
        views_path,
        views_key,
        record_count: records.len(),
    })
}
