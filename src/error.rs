//! Error types shared by every pipeline stage.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while fetching, persisting or publishing a snapshot.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure talking to the pageview API
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The pageview API answered with something other than 200
    #[error("pageview API returned HTTP {status}")]
    UnexpectedStatus { status: u16 },

    /// The body did not contain `items[0].articles`
    #[error("malformed pageview payload: {0}")]
    MalformedPayload(String),

    /// An object store call failed
    #[error("storage error during {op}: {message}")]
    Storage { op: &'static str, message: String },

    /// The destination bucket could not be probed
    #[error("bucket {bucket} is not accessible: {message}")]
    BucketUnavailable { bucket: String, message: String },

    /// Local filesystem failure
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("config error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn storage(op: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Storage {
            op,
            message: message.into(),
        }
    }
}
