//! The summarization pipeline a worker runs for each delivered job.
//!
//! Stages: fetch the blob to a temp file, extract its text, summarize,
//! persist the result. The temp file lives in a local binding scoped to
//! this function, so it is removed whichever way the function exits.

use std::sync::Arc;

use tracing::Instrument;

use crate::db::{summary_repo, Database};
use crate::error::PipelineError;
use crate::extract::extract_pdf_text;
use crate::fetch::BlobFetcher;
use crate::queue::DeliveredJob;
use crate::summarizer::{Summarizer, FAILED_SUMMARY_SENTINEL};

pub struct SummaryPipeline {
    db: Database,
    fetcher: Arc<dyn BlobFetcher>,
    summarizer: Arc<dyn Summarizer>,
    max_input_chars: usize,
}

impl SummaryPipeline {
    pub fn new(
        db: Database,
        fetcher: Arc<dyn BlobFetcher>,
        summarizer: Arc<dyn Summarizer>,
        max_input_chars: usize,
    ) -> Self {
        Self {
            db,
            fetcher,
            summarizer,
            max_input_chars,
        }
    }

    /// Processes one job end to end and returns the persisted summary.
    ///
    /// Persisting before returning means the caller may ack the job
    /// afterwards: a crash in between redelivers, and `record_done` is
    /// an idempotent upsert, so the redelivery rewrites the same record.
    pub async fn run(&self, job: &DeliveredJob) -> Result<String, PipelineError> {
        let span = tracing::info_span!("pipeline", job_id = %job.id, attempt = job.attempts);

        async {
            let url = &job.payload.file_url;

            let blob = self
                .fetcher
                .fetch(url)
                .instrument(tracing::info_span!("fetch", url = %url))
                .await?;

            let text = extract_pdf_text(blob.path())?;
            let input = truncate_chars(&text, self.max_input_chars);
            tracing::debug!(
                extracted = text.len(),
                submitted = input.len(),
                "Extracted document text"
            );

            let raw = self
                .summarizer
                .summarize(input)
                .instrument(tracing::info_span!("summarize"))
                .await?;

            // An empty answer from the provider still terminates the
            // record; the sentinel marks it for the caller.
            let summary = if raw.trim().is_empty() {
                FAILED_SUMMARY_SENTINEL.to_string()
            } else {
                raw
            };

            {
                let _persist = tracing::info_span!("persist").entered();
                summary_repo::record_done(&self.db, url, &job.payload.owner_id, &summary)?;
            }

            tracing::info!(url = %url, chars = summary.len(), "Stored summary");
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}

/// Truncates to at most `max` characters without splitting a code point.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
