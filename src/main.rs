//! # Wiki Pageviews
//!
//! Archives the daily English Wikipedia "top articles" ranking into an S3
//! data lake, once verbatim and once as newline-delimited JSON ready for
//! Athena.
//!
//! ## Usage
//!
//! ```sh
//! wiki_pageviews --date 2024-11-18 --bucket my-datalake
//! ```
//!
//! ## Architecture
//!
//! The application is a short, strictly sequential pipeline:
//! 1. **Fetching**: One GET against the Wikimedia pageview API
//! 2. **Raw archive**: The response body is stored locally and under `datalake/raw/`
//! 3. **Provisioning**: The bucket is created if needed and probed for access
//! 4. **Publishing**: Articles become JSON lines stored locally and under `datalake/views/`
//!
//! Any fatal error makes the process exit non-zero.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod error;
mod fetcher;
mod models;
mod outputs;
mod pipeline;
mod storage;
mod utils;

use cli::Cli;
use config::PipelineConfig;
use fetcher::WikimediaClient;
use storage::S3Store;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("wiki_pageviews starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = PipelineConfig::resolve(&args)?;
    info!(
        date = %config.date,
        bucket = %config.bucket,
        region = %config.region,
        data_dir = %config.data_dir.display(),
        upload_policy = ?config.upload_policy,
        "Resolved configuration"
    );

    let source = WikimediaClient::new(config.api_base.clone(), config.user_agent.clone());
    let store = S3Store::connect(
        &config.bucket,
        &config.region,
        config.endpoint_url.as_deref(),
    )
    .await;

    let report = match pipeline::run(&config, &source, &store).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, elapsed_ms = start_time.elapsed().as_millis() as u64, "Pipeline failed");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        date = %report.date,
        status = report.status,
        records = report.record_count,
        raw_path = %report.raw_path.display(),
        raw_key = ?report.raw_key,
        views_path = %report.views_path.display(),
        views_key = ?report.views_key,
        "Execution complete"
    );

    Ok(())
}
