//! Process-wide configuration, read from the environment once at startup.
//!
//! There is no runtime reconfiguration: `Config::from_env` is called in
//! `main` and the resulting values are passed by reference to the worker
//! pool and API handlers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default queue topic poll interval for idle workers.
const DEFAULT_QUEUE_POLL_MS: u64 = 250;

/// Default maximum number of deliveries before a job is dead-lettered.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default truncation limit applied to extracted text before the
/// summarization call, bounding remote-call cost and latency.
const DEFAULT_MAX_INPUT_CHARS: usize = 12_000;

/// Settings for the remote summarization provider.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Base URL of an OpenAI-compatible chat-completions API.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub worker_count: usize,
    pub max_attempts: u32,
    pub queue_poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub max_input_chars: usize,
    pub summarizer: SummarizerConfig,
}

impl Config {
    /// Reads all settings from the environment.
    ///
    /// `OPENAI_API_KEY` is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_path = match std::env::var("DOCSUM_DATABASE_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_database_path().ok_or(ConfigError::NoHomeDirectory)?,
        };

        let bind_addr = parse_var("DOCSUM_BIND_ADDR", "127.0.0.1:8080")?;
        let worker_count = parse_var("DOCSUM_WORKERS", "1")?;
        let max_attempts = parse_var("DOCSUM_MAX_ATTEMPTS", &DEFAULT_MAX_ATTEMPTS.to_string())?;
        let queue_poll_ms: u64 =
            parse_var("DOCSUM_QUEUE_POLL_MS", &DEFAULT_QUEUE_POLL_MS.to_string())?;
        let fetch_timeout_secs: u64 = parse_var("DOCSUM_FETCH_TIMEOUT_SECS", "30")?;
        let max_input_chars =
            parse_var("DOCSUM_MAX_INPUT_CHARS", &DEFAULT_MAX_INPUT_CHARS.to_string())?;
        let summary_timeout_secs: u64 = parse_var("DOCSUM_SUMMARY_TIMEOUT_SECS", "60")?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::Missing { name: "OPENAI_API_KEY" })?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let model =
            std::env::var("DOCSUM_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        Ok(Self {
            database_path,
            bind_addr,
            worker_count,
            max_attempts,
            queue_poll_interval: Duration::from_millis(queue_poll_ms),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            max_input_chars,
            summarizer: SummarizerConfig {
                base_url,
                api_key,
                model,
                request_timeout: Duration::from_secs(summary_timeout_secs),
            },
        })
    }
}

/// Returns the canonical database path: `~/.docsum/data/docsum.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".docsum").join("data").join("docsum.db"))
}

fn parse_var<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name,
        value: raw,
        reason: e.to_string(),
    })
}
