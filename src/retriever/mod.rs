
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingClient;
use crate::models::{ScoredResult, SegmentMetadata};
use crate::store::VectorStore;
use crate::{RagError, Result};

/// Turns a free-text query into a ranked list of scored segments.
///
/// Orchestrates the embedding client and the vector store gateway, then
/// applies content-length and similarity floors. Ranking order is whatever
/// the store returned; the store is the ranking authority and results are
/// never re-sorted here.
#[derive(Debug, Clone)]
pub struct Retriever {
    embeddings: EmbeddingClient,
    store: VectorStore,
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(embeddings: EmbeddingClient, store: VectorStore, config: RetrievalConfig) -> Self {
        Self {
            embeddings,
            store,
            config,
        }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Search for segments similar to `query_text`.
    ///
    /// Zero surviving results is a valid "no match" outcome, not an error;
    /// callers decide how to handle the unguided case.
    #[inline]
    pub fn search(
        &self,
        query_text: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredResult>> {
        if query_text.trim().is_empty() {
            return Err(RagError::Validation(
                "Query text cannot be empty".to_string(),
            ));
        }

        let query = self.truncate_query(query_text);

        info!(
            "Performing similarity search for query: '{}'",
            preview(&query, 50)
        );

        let query_vector = self.embeddings.embed_query(&query)?;
        let points = self.store.search(&query_vector, limit)?;
        let total_points = points.len();

        let mut results = Vec::with_capacity(total_points);
        for point in points {
            if point.payload.content.trim().chars().count() < self.config.min_content_chars {
                warn!("Skipping point {} due to insufficient content", point.id);
                continue;
            }

            // A malformed stored payload invalidates that item only, never
            // the whole retrieval.
            let constructed = ScoredResult::new(
                point.id.clone(),
                point.payload.content,
                point.payload.source_url,
                SegmentMetadata {
                    title: point.payload.title,
                    created_at: point.payload.created_at,
                },
                point.score,
            );

            match constructed {
                Ok(result) => {
                    if result.similarity_score() >= threshold {
                        results.push(result);
                    }
                }
                Err(e) => {
                    warn!("Skipping point {} due to validation error: {}", point.id, e);
                }
            }
        }

        debug!(
            "Filtered {} points to {} results at threshold {}",
            total_points,
            results.len(),
            threshold
        );
        Ok(results)
    }

    fn truncate_query(&self, query_text: &str) -> String {
        let char_count = query_text.chars().count();
        if char_count <= self.config.max_query_chars {
            return query_text.to_string();
        }

        warn!(
            "Query is very long ({} chars), truncating to {} chars",
            char_count, self.config.max_query_chars
        );
        query_text.chars().take(self.config.max_query_chars).collect()
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
