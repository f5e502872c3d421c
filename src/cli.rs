//! Command-line interface definitions for the pageview archiver.
//!
//! Every option is optional: anything not given here falls back to the YAML
//! file passed with `--config`, then to the built-in defaults (see
//! [`crate::config`]). Each flag can also be set through an environment
//! variable.

use crate::config::UploadPolicy;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the pageview archiver.
///
/// # Examples
///
/// ```sh
/// # Archive the default day into the default bucket
/// wiki_pageviews
///
/// # A different day, bucket and region
/// wiki_pageviews -d 2024-12-01 -b my-datalake -r us-east-1
///
/// # Against a local MinIO, keep going if an upload fails
/// wiki_pageviews --endpoint-url http://localhost:9000 --on-upload-failure continue
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Day to fetch, as YYYY-MM-DD
    #[arg(short, long, env = "PAGEVIEWS_DATE")]
    pub date: Option<NaiveDate>,

    /// Destination S3 bucket
    #[arg(short, long, env = "PAGEVIEWS_BUCKET")]
    pub bucket: Option<String>,

    /// Region the bucket lives in (also used as its location constraint)
    #[arg(short, long, env = "PAGEVIEWS_REGION")]
    pub region: Option<String>,

    /// Base directory for local copies of the artifacts
    #[arg(long, env = "PAGEVIEWS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the Wikimedia REST API
    #[arg(long, env = "PAGEVIEWS_API_BASE")]
    pub api_base: Option<String>,

    /// User-Agent header sent to the API
    #[arg(long, env = "PAGEVIEWS_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[arg(long, env = "S3_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "PAGEVIEWS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Whether a failed upload aborts the run or is only logged
    #[arg(long, value_enum, env = "PAGEVIEWS_UPLOAD_POLICY")]
    pub on_upload_failure: Option<UploadPolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "wiki_pageviews",
            "--date",
            "2024-11-18",
            "--bucket",
            "my-bucket",
            "--data-dir",
            "/tmp/data",
            "--on-upload-failure",
            "continue",
        ]);

        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2024, 11, 18));
        assert_eq!(cli.bucket.as_deref(), Some("my-bucket"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/data")));
        assert_eq!(cli.on_upload_failure, Some(UploadPolicy::Continue));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["wiki_pageviews", "-d", "2024-01-31", "-r", "us-east-1"]);

        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(cli.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["wiki_pageviews", "--date", "18/11/2024"]).is_err());
    }

    #[test]
    fn test_cli_reads_user_agent_from_env() {
        // only this test touches PAGEVIEWS_USER_AGENT
        unsafe { std::env::set_var("PAGEVIEWS_USER_AGENT", "pageviews-bot/1.0") };
        let cli = Cli::parse_from(["wiki_pageviews"]);
        unsafe { std::env::remove_var("PAGEVIEWS_USER_AGENT") };

        assert_eq!(cli.user_agent.as_deref(), Some("pageviews-bot/1.0"));
    }
}
