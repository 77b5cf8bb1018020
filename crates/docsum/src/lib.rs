//! docsum — asynchronous document summarization service.
//!
//! Submitted documents are queued durably, processed by a worker pool
//! (download, text extraction, remote summarization), and their results
//! stored for retrieval through a polling HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod poller;
pub mod queue;
pub mod summarizer;
pub mod worker;

pub use config::Config;
pub use db::Database;
pub use error::{DocsumError, FailureKind, Result};
pub use queue::{JobPayload, JobQueue, SUMMARIZE_TOPIC};
pub use worker::{SummaryPipeline, WorkerConfig, WorkerPool};
