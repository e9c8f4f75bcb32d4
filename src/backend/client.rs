//! HTTP client for the tutor backend's speech endpoints.
//!
//! All connection details come from [`BackendConfig`]; nothing is hardcoded.

use thiserror::Error;

use crate::config::BackendConfig;
use crate::viseme::TimelineError;

use super::synthesis::{parse_utterance, Synthesis, Utterance};

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Nothing to synthesize.
    #[error("no text provided")]
    EmptyText,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("backend request timed out")]
    Timeout,

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Server { status: u16, message: String },

    /// The response body was not a synthesis result.
    #[error("failed to parse backend response: {0}")]
    Parse(String),

    /// The returned visemes do not form a valid timeline.
    #[error("invalid viseme timeline: {0}")]
    Timeline(#[from] TimelineError),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// BackendClient
// ---------------------------------------------------------------------------

/// Calls `/synthesize` and `/greeting` and resolves the returned audio URLs.
pub struct BackendClient {
    client: reqwest::Client,
    config: BackendConfig,
}

impl BackendClient {
    /// Build a client from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Ask the tutor to answer `text` and synthesize the answer.
    ///
    /// The returned visemes are already validated; an unordered or
    /// non-finite offset yields [`BackendError::Timeline`].
    pub async fn synthesize(&self, text: &str) -> Result<Utterance, BackendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::EmptyText);
        }

        let url = self.endpoint("synthesize");
        log::debug!("backend: POST {url} ({} chars)", text.len());

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        Self::read(response).await
    }

    /// Fetch the tutor's opening greeting.
    pub async fn greeting(&self) -> Result<Utterance, BackendError> {
        let url = self.endpoint("greeting");
        log::debug!("backend: GET {url}");

        let response = self.client.get(&url).send().await?;
        Self::read(response).await
    }

    /// Absolute URL of a synthesis result's audio.
    pub fn audio_url(&self, synthesis: &Synthesis) -> String {
        let url = synthesis.audio_url.as_str();
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.endpoint(url)
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn read(response: reqwest::Response) -> Result<Utterance, BackendError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        let utterance = parse_utterance(status, &body)?;
        log::debug!(
            "backend: {} visemes for {}",
            utterance.timeline.len(),
            utterance.synthesis.audio_url
        );
        Ok(utterance)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
