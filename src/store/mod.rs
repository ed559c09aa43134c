
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::QdrantConfig;
use crate::models::Segment;
use crate::{RagError, Result};

/// Outcome of one connection attempt under a bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Success,
    Retry { next_attempt: u32 },
    Exhausted,
}

/// Bounded retry with a fixed delay between attempts, expressed as an
/// explicit state machine so the policy is testable without a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Decide what follows the given 1-based attempt.
    #[inline]
    pub fn next(&self, attempt: u32, succeeded: bool) -> ConnectOutcome {
        if succeeded {
            ConnectOutcome::Success
        } else if attempt >= self.max_attempts {
            ConnectOutcome::Exhausted
        } else {
            ConnectOutcome::Retry {
                next_attempt: attempt + 1,
            }
        }
    }
}

/// Gateway to an external Qdrant instance over its REST API.
///
/// Owns connection establishment with bounded retry, collection lifecycle,
/// point upserts, and nearest-neighbor queries. Distance computation and
/// ranking are delegated entirely to the store.
#[derive(Debug, Clone)]
pub struct VectorStore {
    base_url: Url,
    api_key: Option<String>,
    collection: String,
    dimension: u32,
    payload_content_limit: usize,
    agent: ureq::Agent,
}

/// A point returned by a similarity search, before domain validation.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoredPoint {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub payload: PointPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PointPayload {
    pub content: String,
    pub source_url: String,
    pub title: String,
    pub created_at: String,
    pub content_length: usize,
}

#[derive(Debug, Deserialize)]
struct CollectionsResponse {
    result: CollectionsResult,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    points_count: u64,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    points: Vec<StoredPoint>,
}

impl VectorStore {
    /// Establish a connection, probing the collections endpoint with bounded
    /// retry. Exhausting the retry budget is fatal for the caller.
    #[inline]
    pub fn connect(config: &QdrantConfig, payload_content_limit: usize) -> Result<Self> {
        let base_url = config
            .parsed_url()
            .map_err(|e| RagError::Config(format!("Invalid Qdrant URL: {e}")))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        let store = Self {
            base_url,
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            dimension: config.embedding_dimension,
            payload_content_limit,
            agent,
        };

        let policy = RetryPolicy {
            max_attempts: config.retry_attempts,
            delay: Duration::from_millis(config.retry_delay_ms),
        };

        let mut attempt = 1;
        loop {
            info!(
                "Connecting to Qdrant at {} (attempt {})",
                store.base_url, attempt
            );

            let probe = store.list_collections();
            match policy.next(attempt, probe.is_ok()) {
                ConnectOutcome::Success => {
                    info!("Successfully connected to Qdrant");
                    return Ok(store);
                }
                ConnectOutcome::Retry { next_attempt } => {
                    if let Err(e) = probe {
                        warn!("Connection attempt {} failed: {}", attempt, e);
                    }
                    std::thread::sleep(policy.delay);
                    attempt = next_attempt;
                }
                ConnectOutcome::Exhausted => {
                    let detail = probe
                        .err()
                        .map_or_else(String::new, |e| format!(": {e}"));
                    return Err(RagError::Connection(format!(
                        "Failed to connect to Qdrant after {} attempts{detail}",
                        policy.max_attempts
                    )));
                }
            }
        }
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[inline]
    pub fn collection_exists(&self) -> Result<bool> {
        let names = self.list_collections()?;
        Ok(names.iter().any(|name| *name == self.collection))
    }

    /// Create the collection with the configured dimensionality and cosine
    /// distance if it does not exist. Idempotent: a second call is a no-op.
    #[inline]
    pub fn ensure_collection(&self) -> Result<()> {
        if self.collection_exists()? {
            debug!("Collection '{}' already exists", self.collection);
            return Ok(());
        }

        let body = json!({
            "vectors": {
                "size": self.dimension,
                "distance": "Cosine",
            }
        });

        let url = self.collection_url("")?;
        self.send_json("PUT", &url, &body)?;

        info!(
            "Created collection '{}' with {} dimensions",
            self.collection, self.dimension
        );
        Ok(())
    }

    /// Upsert a single embedded segment, keyed by its deterministic id.
    /// Re-ingestion overwrites rather than duplicates. Payload content is
    /// truncated to the configured cap before storage.
    #[inline]
    pub fn upsert_segment(&self, segment: &Segment) -> Result<()> {
        self.require_collection()?;

        let embedding = segment.embedding.as_ref().ok_or_else(|| {
            RagError::Validation(format!("Segment {} has no embedding to store", segment.id))
        })?;

        let content: String = segment
            .content
            .chars()
            .take(self.payload_content_limit)
            .collect();

        let body = json!({
            "points": [{
                "id": segment.id.to_string(),
                "vector": embedding,
                "payload": {
                    "content": content,
                    "source_url": segment.source_url,
                    "title": segment.metadata.title,
                    "created_at": segment.metadata.created_at,
                    "content_length": segment.content.chars().count(),
                },
            }]
        });

        let url = self.collection_url("/points")?;
        self.send_json("PUT", &url, &body)?;

        debug!("Upserted segment {}", segment.id);
        Ok(())
    }

    /// Nearest-neighbor search, ranked descending by score by the store.
    #[inline]
    pub fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<StoredPoint>> {
        self.require_collection()?;

        let body = json!({
            "query": query_vector,
            "limit": limit,
            "with_payload": true,
        });

        let url = self.collection_url("/points/query")?;
        let response_text = self.send_json("POST", &url, &body)?;

        let response: QueryResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Connection(format!("Failed to parse search response: {e}"))
        })?;

        debug!("Search returned {} points", response.result.points.len());
        Ok(response.result.points)
    }

    /// Total number of points stored in the collection.
    #[inline]
    pub fn count_points(&self) -> Result<u64> {
        self.require_collection()?;

        let url = self.collection_url("")?;
        let response_text = self.get(&url)?;

        let response: CollectionInfoResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Connection(format!("Failed to parse collection info: {e}")))?;

        Ok(response.result.points_count)
    }

    fn require_collection(&self) -> Result<()> {
        if self.collection_exists()? {
            Ok(())
        } else {
            Err(RagError::NotFound(format!(
                "Collection '{}' does not exist",
                self.collection
            )))
        }
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let url = self
            .base_url
            .join("/collections")
            .map_err(|e| RagError::Config(format!("Failed to build collections URL: {e}")))?;

        let response_text = self.get(&url)?;

        let response: CollectionsResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Connection(format!("Failed to parse collections response: {e}"))
        })?;

        Ok(response
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    fn collection_url(&self, suffix: &str) -> Result<Url> {
        self.base_url
            .join(&format!("/collections/{}{}", self.collection, suffix))
            .map_err(|e| RagError::Config(format!("Failed to build collection URL: {e}")))
    }

    fn get(&self, url: &Url) -> Result<String> {
        let mut request = self.agent.get(url.as_str());
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        request
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| map_transport_error(url, &e))
    }

    fn send_json(&self, method: &str, url: &Url, body: &serde_json::Value) -> Result<String> {
        let request_json = serde_json::to_string(body)
            .map_err(|e| RagError::Connection(format!("Failed to serialize request: {e}")))?;

        let mut request = match method {
            "PUT" => self.agent.put(url.as_str()),
            _ => self.agent.post(url.as_str()),
        }
        .header("Content-Type", "application/json");

        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        request
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| map_transport_error(url, &e))
    }
}

fn map_transport_error(url: &Url, error: &ureq::Error) -> RagError {
    match error {
        ureq::Error::StatusCode(404) => {
            RagError::NotFound(format!("Qdrant resource not found: {url}"))
        }
        ureq::Error::StatusCode(status) => {
            RagError::Connection(format!("Qdrant returned HTTP {status} for {url}"))
        }
        _ => RagError::Connection(format!("Request to {url} failed: {error}")),
    }
}
