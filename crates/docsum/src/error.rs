use std::path::PathBuf;
use thiserror::Error;

/// Classifies a worker-side failure for the retry decision.
///
/// Transient failures are requeued up to the configured attempt limit;
/// permanent failures dead-letter immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

#[derive(Error, Debug)]
pub enum DocsumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{name}' has invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Missing required environment variable '{name}'")]
    Missing { name: &'static str },

    #[error("Could not determine a home directory for the default database path")]
    NoHomeDirectory,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to download '{url}': {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of '{url}' returned HTTP {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Failed to spool download to temporary file: {0}")]
    Spool(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse PDF: {0}")]
    PdfParse(String),
}

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("Summarization request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Summarization provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

/// A failure in one of the worker's processing stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Summarization failed: {0}")]
    Summarize(#[from] SummarizeError),

    #[error("Persistence failed: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl PipelineError {
    /// Retry classification consulted by the queue's fail/dead-letter decision.
    ///
    /// Network and persistence failures are worth retrying; an unparseable
    /// document or a provider rejecting the request outright will not get
    /// better on redelivery.
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Fetch(_) => FailureKind::Transient,
            PipelineError::Extract(_) => FailureKind::Permanent,
            PipelineError::Summarize(e) => match e {
                SummarizeError::Request(_) => FailureKind::Transient,
                // Rate limits and server errors clear up; other statuses
                // (invalid key, bad request) do not.
                SummarizeError::Provider { status, .. } => {
                    if *status == 429 || *status >= 500 {
                        FailureKind::Transient
                    } else {
                        FailureKind::Permanent
                    }
                }
                SummarizeError::Decode(_) => FailureKind::Permanent,
            },
            PipelineError::Database(_) => FailureKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, DocsumError>;
