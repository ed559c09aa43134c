#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::{RagError, Result};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

const INPUT_TYPE_DOCUMENT: &str = "search_document";
const INPUT_TYPE_QUERY: &str = "search_query";

/// Client for a Cohere-style embedding endpoint.
///
/// Batches requests under the provider's batch-size cap and spaces batches
/// out with a fixed delay to stay under rate limits. Construction fails fast
/// when no credential is configured.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    base_url: Url,
    api_key: String,
    model: String,
    batch_size: usize,
    batch_delay: Duration,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RagError::Config("COHERE_API_KEY is not set".to_string()))?;

        let base_url = Url::parse(&config.api_url)
            .map_err(|e| RagError::Config(format!("Invalid embedding API URL: {e}")))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            model: config.model.clone(),
            batch_size: config.batch_size,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            agent,
            retry_attempts: config.retry_attempts,
        })
    }

    /// Embed an ordered list of document texts.
    ///
    /// Output preserves input order with one vector per input text. A failed
    /// batch is propagated; no partial batch is ever accepted as successful.
    #[inline]
    pub fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let total_batches = texts.len().div_ceil(self.batch_size);
        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let batch_embeddings = self
                .embed_batch(batch, INPUT_TYPE_DOCUMENT)
                .inspect_err(|e| {
                    error!(
                        "Embedding batch {}/{} failed: {}",
                        batch_index + 1,
                        total_batches,
                        e
                    );
                })?;

            embeddings.extend(batch_embeddings);
            debug!("Embedded batch {}/{}", batch_index + 1, total_batches);

            // Inter-batch delay keeps us under the provider's rate limits.
            if batch_index + 1 < total_batches {
                std::thread::sleep(self.batch_delay);
            }
        }

        debug!("Generated {} embeddings total", embeddings.len());
        Ok(embeddings)
    }

    /// Embed a single search query.
    #[inline]
    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut embeddings = self.embed_batch(&texts, INPUT_TYPE_QUERY)?;

        embeddings
            .pop()
            .ok_or_else(|| RagError::Provider("Provider returned no query embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[String], input_type: &str) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            texts,
            model: &self.model,
            input_type,
        };

        let url = self
            .base_url
            .join("/v1/embed")
            .map_err(|e| RagError::Config(format!("Failed to build embed URL: {e}")))?;

        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Provider(format!("Failed to serialize embed request: {e}")))?;

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Provider(format!("Failed to parse embed response: {e}")))?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::Provider(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "Embedding request attempt {}/{}",
                attempt, self.retry_attempts
            );

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Provider server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                return Err(RagError::Provider(format!(
                                    "Provider rejected request: HTTP {status}"
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
                            return Err(RagError::Provider(format!(
                                "Non-retryable provider error: {error}"
                            )));
                        }
                    };

                    if should_retry {
                        last_error = Some(RagError::Provider(format!("Request error: {error}")));

                        if attempt < self.retry_attempts {
                            let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                            std::thread::sleep(Duration::from_millis(delay_ms));
                        }
                    }
                }
            }
        }

        error!("All retry attempts failed for embedding request");

        Err(last_error
            .unwrap_or_else(|| RagError::Provider("Request failed after retries".to_string())))
    }
}
