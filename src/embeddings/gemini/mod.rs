#[cfg(test)]
mod tests;

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::{AnalyzerError, Result};

pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Client for the Gemini embedding REST API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    model: String,
    api_key: String,
    batch_size: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

impl GeminiClient {
    /// Create a client, resolving the API key from the process environment.
    /// A missing or empty key surfaces as `EmbeddingUnavailable`.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = env::var(API_KEY_ENV_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AnalyzerError::EmbeddingUnavailable(format!(
                    "missing {API_KEY_ENV_VAR}: set it in your environment"
                ))
            })?;

        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit API key
    #[inline]
    pub fn with_api_key(config: &Config, api_key: String) -> Result<Self> {
        let base_url = config.gemini.endpoint_url().map_err(|e| {
            AnalyzerError::EmbeddingUnavailable(format!("invalid Gemini endpoint: {e}"))
        })?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.gemini.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.gemini.model.clone(),
            api_key,
            batch_size: config.gemini.batch_size,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Generate embeddings for a batch of texts, preserving input order
    #[inline]
    pub fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_single_batch(batch)?);
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if vectors.iter().any(|v| v.len() != dimension) {
            return Err(AnalyzerError::EmbeddingResponseInvalid(
                "embedding vectors have inconsistent dimensions".to_string(),
            ));
        }

        debug!(
            "Generated {} embeddings with {} dimensions",
            vectors.len(),
            dimension
        );
        Ok(vectors)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{}", self.model),
                    content: EmbedContent {
                        parts: vec![EmbedPart { text: text.clone() }],
                    },
                })
                .collect(),
        };

        let url = self
            .base_url
            .join(&format!("/v1beta/models/{}:batchEmbedContents", self.model))
            .map_err(|e| {
                AnalyzerError::EmbeddingUnavailable(format!("failed to build embedding URL: {e}"))
            })?;

        let request_json = serde_json::to_string(&request).map_err(|e| {
            AnalyzerError::EmbeddingResponseInvalid(format!(
                "failed to serialize embedding request: {e}"
            ))
        })?;

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header("x-goog-api-key", &self.api_key)
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            AnalyzerError::EmbeddingResponseInvalid(format!(
                "failed to parse embedding response: {e}"
            ))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(AnalyzerError::EmbeddingResponseInvalid(format!(
                "requested {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        response
            .embeddings
            .into_iter()
            .map(|embedding| {
                if embedding.values.is_empty() {
                    Err(AnalyzerError::EmbeddingResponseInvalid(
                        "embedding response contained an empty vector".to_string(),
                    ))
                } else {
                    Ok(embedding.values)
                }
            })
            .collect()
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(AnalyzerError::EmbeddingUnavailable(format!(
                                    "Gemini API rejected the request: HTTP {status}"
                                )));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(AnalyzerError::EmbeddingUnavailable(format!(
                            "embedding request failed: {error}"
                        )));
                    }

                    last_error = Some(AnalyzerError::EmbeddingUnavailable(format!(
                        "embedding request failed: {error}"
                    )));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| {
            AnalyzerError::EmbeddingUnavailable("request failed after retries".to_string())
        }))
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    // The blocking HTTP client (and its retry sleeps) runs on the blocking
    // pool so a runtime worker is never parked.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || client.generate_embeddings(&texts))
            .await
            .map_err(|e| {
                AnalyzerError::Other(anyhow::anyhow!("embedding task panicked: {e}"))
            })?
    }
}
