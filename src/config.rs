//! Pipeline configuration.
//!
//! Values are resolved in three layers: command-line flags (or their
//! environment variables) win over an optional YAML file, which wins over
//! the built-in defaults. The result is a [`PipelineConfig`] handed to every
//! stage explicitly.

use crate::cli::Cli;
use crate::error::PipelineError;
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const DEFAULT_DATE: &str = "2024-11-18";
pub const DEFAULT_BUCKET: &str = "michel-cc-wikidata";
pub const DEFAULT_REGION: &str = "eu-west-1";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_API_BASE: &str = "https://wikimedia.org/api/rest_v1";
pub const DEFAULT_USER_AGENT: &str = "curl/7.68.0";

/// What to do when an upload to the object store fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UploadPolicy {
    /// Stop the run and exit non-zero.
    #[default]
    Abort,
    /// Log the failure and keep going with the next stage.
    Continue,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub date: NaiveDate,
    pub bucket: String,
    pub region: String,
    pub data_dir: PathBuf,
    pub api_base: String,
    pub user_agent: String,
    /// Custom S3 endpoint (MinIO, LocalStack, ...). `None` means AWS.
    pub endpoint_url: Option<String>,
    pub upload_policy: UploadPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            date: NaiveDate::parse_from_str(DEFAULT_DATE, "%Y-%m-%d").unwrap_or_default(),
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            endpoint_url: None,
            upload_policy: UploadPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Local directory for raw API responses.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw-views")
    }

    /// Local directory for JSON lines files.
    pub fn views_dir(&self) -> PathBuf {
        self.data_dir.join("views")
    }

    /// Overlay the values present in a YAML file.
    fn apply_file(&mut self, file: FileConfig) -> Result<(), PipelineError> {
        if let Some(date) = file.date {
            self.date = parse_date(&date)?;
        }
        if let Some(bucket) = file.bucket {
            self.bucket = bucket;
        }
        if let Some(region) = file.region {
            self.region = region;
        }
        if let Some(data_dir) = file.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(api_base) = file.api_base {
            self.api_base = api_base;
        }
        if let Some(user_agent) = file.user_agent {
            self.user_agent = user_agent;
        }
        if file.endpoint_url.is_some() {
            self.endpoint_url = file.endpoint_url;
        }
        if let Some(policy) = file.upload_policy {
            self.upload_policy = policy;
        }
        Ok(())
    }

    /// Overlay the flags given on the command line.
    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(date) = cli.date {
            self.date = date;
        }
        if let Some(ref bucket) = cli.bucket {
            self.bucket = bucket.clone();
        }
        if let Some(ref region) = cli.region {
            self.region = region.clone();
        }
        if let Some(ref data_dir) = cli.data_dir {
            self.data_dir = data_dir.clone();
        }
        if let Some(ref api_base) = cli.api_base {
            self.api_base = api_base.clone();
        }
        if let Some(ref user_agent) = cli.user_agent {
            self.user_agent = user_agent.clone();
        }
        if cli.endpoint_url.is_some() {
            self.endpoint_url = cli.endpoint_url.clone();
        }
        if let Some(policy) = cli.on_upload_failure {
            self.upload_policy = policy;
        }
    }

    /// Resolve the configuration for this run from defaults, the optional
    /// YAML file named by `--config`, and the command line.
    #[instrument(level = "info", skip_all)]
    pub fn resolve(cli: &Cli) -> Result<Self, PipelineError> {
        let mut config = PipelineConfig::default();
        if let Some(ref path) = cli.config {
            let file = load_config(path)?;
            config.apply_file(file)?;
            info!(path = %path.display(), "Loaded configuration file");
        }
        config.apply_cli(cli);
        if config.bucket.trim().is_empty() {
            return Err(PipelineError::Config("bucket name is empty".to_string()));
        }
        Ok(config)
    }
}

/// On-disk YAML shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub date: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub api_base: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint_url: Option<String>,
    pub upload_policy: Option<UploadPolicy>,
}

/// Read and parse a YAML configuration file.
pub fn load_config(path: &Path) -> Result<FileConfig, PipelineError> {
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    serde_yaml::from_str(&text)
        .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| PipelineError::Config(format!("invalid date {s:?}: {e}")))
}
