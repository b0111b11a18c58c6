//! Client for the external summarization service.
//!
//! The enrichment pipeline assembles a context prompt per unit and hands it to this
//! client; the trimmed response becomes the representative text that is embedded and
//! matched at query time. The HTTP client issues requests directly to the runtime and
//! is swapped for a stub in tests via the [`Summarizer`] trait.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_SUMMARIZER_URL: &str = "http://127.0.0.1:11434";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors surfaced while requesting a summary.
#[derive(Debug, Error)]
pub enum SummarizerError {
    /// Service was unreachable before a response arrived.
    #[error("Summarization service unavailable: {0}")]
    Unavailable(String),
    /// Service returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Service response could not be parsed.
    #[error("Malformed summarization response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the summarization service.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    /// Fully qualified model identifier understood by the service.
    pub model: String,
    /// Prompt assembled by the enrichment pipeline.
    pub prompt: String,
}

/// Interface implemented by summarization backends.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Generate a search-oriented summary for the supplied prompt.
    async fn summarize(&self, request: SummaryRequest) -> Result<String, SummarizerError>;
}

/// Build a summarization client from the loaded configuration.
pub fn get_summarizer() -> Box<dyn Summarizer + Send + Sync> {
    let config = get_config();
    let base_url = config
        .summarizer_url
        .clone()
        .unwrap_or_else(|| DEFAULT_SUMMARIZER_URL.to_string());
    Box::new(HttpSummarizer::new(base_url))
}

/// HTTP summarization client speaking the local generation API.
pub struct HttpSummarizer {
    http: Client,
    base_url: String,
}

impl HttpSummarizer {
    /// Construct a client targeting the given base URL.
    pub fn new(base_url: String) -> Self {
        let http = Client::builder()
            .user_agent("docdex/summarize")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to construct reqwest::Client for summarization");
        Self { http, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, request: SummaryRequest) -> Result<String, SummarizerError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                // Lower temperature keeps representative texts stable across re-runs.
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizerError::Unavailable(format!(
                    "failed to reach summarizer at {}: {error}",
                    self.base_url
                ))
            })?;

        decode_generate_response(response).await
    }
}

async fn decode_generate_response(response: reqwest::Response) -> Result<String, SummarizerError> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(SummarizerError::Unavailable(
            "summarizer generation endpoint returned 404".into(),
        )),
        status if !status.is_success() => {
            let body = response.text().await.unwrap_or_default();
            Err(SummarizerError::GenerationFailed(format!(
                "summarizer returned {status}: {body}"
            )))
        }
        _ => {
            let body: GenerateResponse = response.json().await.map_err(|error| {
                SummarizerError::InvalidResponse(format!(
                    "failed to decode summarizer response: {error}"
                ))
            })?;
            if !body.done {
                return Err(SummarizerError::InvalidResponse(
                    "summarizer response incomplete (streaming not supported)".into(),
                ));
            }
            Ok(body.response.trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn summarizer_trims_successful_response() {
        let server = MockServer::start_async().await;
        let client = HttpSummarizer::new(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "  Distilled summary.  ",
                    "done": true
                }));
            })
            .await;

        let summary = client
            .summarize(SummaryRequest {
                model: "gen-model".into(),
                prompt: "Summarize".into(),
            })
            .await
            .expect("summary");

        mock.assert();
        assert_eq!(summary, "Distilled summary.");
    }

    #[tokio::test]
    async fn summarizer_surfaces_error_status() {
        let server = MockServer::start_async().await;
        let client = HttpSummarizer::new(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = client
            .summarize(SummaryRequest {
                model: "gen-model".into(),
                prompt: "Summarize".into(),
            })
            .await
            .expect_err("error response");

        assert!(
            matches!(error, SummarizerError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn summarizer_rejects_incomplete_response() {
        let server = MockServer::start_async().await;
        let client = HttpSummarizer::new(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "partial",
                    "done": false
                }));
            })
            .await;

        let error = client
            .summarize(SummaryRequest {
                model: "gen-model".into(),
                prompt: "Summarize".into(),
            })
            .await
            .expect_err("incomplete response");

        assert!(matches!(error, SummarizerError::InvalidResponse(_)));
    }
}
