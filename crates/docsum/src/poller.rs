//! Status poller — a client-side helper that polls the status endpoint
//! until a document's summary reaches a terminal state or a deadline
//! passes. Used by integration tests and embedding clients that want a
//! blocking "wait for my summary" call over the polling API.

use std::time::Duration;

use serde::Deserialize;

use crate::api::SESSION_HEADER;
use crate::error::DocsumError;

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between status requests.
    pub interval: Duration,
    /// Total time to wait before giving up on a document.
    pub give_up_after: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            give_up_after: Duration::from_secs(120),
        }
    }
}

/// Terminal result of a polling wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Done(String),
    /// The service reported a terminal failure for the document.
    Failed,
    /// The deadline passed while the document was still pending or
    /// unknown. The job may yet finish; the caller just stopped waiting.
    TimedOut,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    summary: Option<String>,
}

pub struct StatusPoller {
    client: reqwest::Client,
    base_url: String,
    session_user: String,
    config: PollConfig,
}

impl StatusPoller {
    pub fn new(base_url: &str, session_user: &str, config: PollConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session_user: session_user.to_string(),
            config,
        }
    }

    /// Polls until the document reaches `done` or `failed`, or the
    /// configured deadline passes. `not_found` and `pending` both mean
    /// "keep waiting": a placeholder row may not be visible yet.
    pub async fn wait_for_summary(&self, file_url: &str) -> Result<PollOutcome, DocsumError> {
        let deadline = tokio::time::Instant::now() + self.config.give_up_after;

        loop {
            match self.poll_once(file_url).await? {
                Some(outcome) => return Ok(outcome),
                None => {
                    if tokio::time::Instant::now() + self.config.interval > deadline {
                        tracing::warn!(file_url, "Gave up waiting for summary");
                        return Ok(PollOutcome::TimedOut);
                    }
                    tokio::time::sleep(self.config.interval).await;
                }
            }
        }
    }

    async fn poll_once(&self, file_url: &str) -> Result<Option<PollOutcome>, DocsumError> {
        let response = self
            .client
            .get(format!("{}/api/summary-status", self.base_url))
            .query(&[("fileUrl", file_url)])
            .header(SESSION_HEADER, &self.session_user)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: StatusResponse = response.error_for_status()?.json().await?;

        let outcome = match body.status.as_str() {
            "done" => Some(PollOutcome::Done(body.summary.unwrap_or_default())),
            "failed" => Some(PollOutcome::Failed),
            _ => None,
        };
        Ok(outcome)
    }
}
