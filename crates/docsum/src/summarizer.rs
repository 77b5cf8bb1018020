//! Remote text summarization.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint with a fixed
//! instructive template. The caller truncates input beforehand; this
//! module only shapes the request and classifies the response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SummarizerConfig;
use crate::error::SummarizeError;

/// Persisted in place of a summary when the provider answers
/// successfully but with empty content, so the record still reaches a
/// terminal state instead of staying pending forever.
pub const FAILED_SUMMARY_SENTINEL: &str = "Summary failed";

/// The fixed instruction prepended to the document text.
const PROMPT_TEMPLATE: &str = "Summarize the following document:\n\n";

const SAMPLING_TEMPERATURE: f32 = 0.7;

/// Produces a summary for a block of extracted document text.
///
/// Returns the provider's raw content; empty output is legal here and
/// mapped to [`FAILED_SUMMARY_SENTINEL`] by the pipeline.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Production summarizer against an OpenAI-compatible API.
pub struct OpenAiSummarizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(config: &SummarizerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let prompt = format!("{PROMPT_TEMPLATE}{text}");
        let request = ChatRequest {
            model: &self.model,
            temperature: SAMPLING_TEMPERATURE,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizeError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::Decode(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        tracing::debug!(chars = content.len(), "Received summary from provider");
        Ok(content)
    }
}
