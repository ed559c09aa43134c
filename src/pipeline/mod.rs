#[cfg(test)]
mod tests;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::chunker::segment_page;
use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::models::{
    QueryCategory, QueryPriority, TestQuery, ValidationReport,
};
use crate::report::{build_report, failure_report};
use crate::retriever::Retriever;
use crate::store::VectorStore;
use crate::validation::{load_test_queries, validate_retrieved_data};
use crate::{RagError, Result};

/// End-to-end validation runner: connects once, then evaluates a set of test
/// queries against the stored index and emits one report per query.
pub struct ValidationPipeline {
    retriever: Retriever,
    config: Config,
}

impl ValidationPipeline {
    /// Connect to the vector store and embedding provider. Connection
    /// failure after bounded retries is fatal here, not per query.
    #[inline]
    pub fn new(config: Config) -> Result<Self> {
        let embeddings = EmbeddingClient::new(&config.embedding)?;
        let store = VectorStore::connect(&config.qdrant, config.retrieval.payload_content_limit)?;
        let retriever = Retriever::new(embeddings, store, config.retrieval.clone());

        Ok(Self { retriever, config })
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Run the complete validation pipeline.
    ///
    /// An ad-hoc `query` takes precedence over a `category` filter; with
    /// neither, every built-in test query runs. One failing query yields a
    /// zero-accuracy failure report and never blocks the rest of the batch.
    #[inline]
    pub fn run(
        &self,
        query: Option<&str>,
        category: Option<QueryCategory>,
    ) -> Vec<ValidationReport> {
        let pipeline_start = Utc::now();
        info!("Starting complete retrieval validation pipeline");

        let queries = match query {
            Some(text) => vec![ad_hoc_query(text)],
            None => load_test_queries(category),
        };

        let reports: Vec<ValidationReport> = queries
            .iter()
            .map(|test_query| self.evaluate_query(test_query))
            .collect();

        let passed = reports.iter().filter(|r| r.validation_passed).count();
        let total_ms = (Utc::now() - pipeline_start).num_milliseconds();
        info!(
            "Validation pipeline completed in {}ms: {}/{} queries passed",
            total_ms,
            passed,
            reports.len()
        );

        reports
    }

    /// Evaluate one test query, absorbing failures into a failure report.
    #[inline]
    pub fn evaluate_query(&self, test_query: &TestQuery) -> ValidationReport {
        info!(
            "Validating query: '{}' (ID: {})",
            test_query.text, test_query.id
        );

        let query_start = Utc::now();

        let search = self.retriever.search(
            &test_query.text,
            self.config.retrieval.max_results,
            self.config.retrieval.similarity_threshold,
        );

        match search {
            Ok(results) => {
                let (_passed, details) = validate_retrieved_data(
                    &results,
                    &test_query.expected_keywords,
                    self.config.consistency.keyword_match_ratio,
                );
                let query_end = Utc::now();
                let report = build_report(
                    &test_query.text,
                    &results,
                    &details,
                    Some(query_start),
                    Some(query_end),
                );

                info!(
                    "Query '{}' validation: {} ({} results, {:.0}% accuracy)",
                    test_query.id,
                    if report.validation_passed {
                        "PASSED"
                    } else {
                        "FAILED"
                    },
                    report.results_count,
                    report.accuracy_score * 100.0
                );

                report
            }
            Err(e) => {
                error!("Validation failed for query '{}': {}", test_query.text, e);
                failure_report(&test_query.text, &e.to_string(), Some(query_start))
            }
        }
    }
}

fn ad_hoc_query(text: &str) -> TestQuery {
    TestQuery {
        id: "custom_query".to_string(),
        text: text.to_string(),
        expected_keywords: Vec::new(),
        category: QueryCategory::Concept,
        priority: QueryPriority::High,
    }
}

/// Write path: chunk a page, embed the chunks, and upsert the segments under
/// their deterministic ids so re-ingestion overwrites instead of duplicating.
pub struct IngestPipeline {
    embeddings: EmbeddingClient,
    store: VectorStore,
    config: Config,
}

impl IngestPipeline {
    #[inline]
    pub fn new(config: Config) -> Result<Self> {
        let embeddings = EmbeddingClient::new(&config.embedding)?;
        let store = VectorStore::connect(&config.qdrant, config.retrieval.payload_content_limit)?;

        Ok(Self {
            embeddings,
            store,
            config,
        })
    }

    /// Ingest one page of extracted text. Returns the number of segments
    /// written to the store.
    #[inline]
    pub fn ingest_page(&self, text: &str, source_url: &str, title: &str) -> Result<usize> {
        if text.trim().is_empty() {
            return Err(RagError::Validation(
                "Page text cannot be empty".to_string(),
            ));
        }

        self.store.ensure_collection()?;

        let mut segments = segment_page(text, source_url, title, &self.config.chunking);
        info!(
            "Ingesting {} segments from {}",
            segments.len(),
            source_url
        );

        let texts: Vec<String> = segments.iter().map(|s| s.content.clone()).collect();
        let embeddings = self.embeddings.embed_documents(&texts)?;

        for (segment, embedding) in segments.iter_mut().zip(embeddings) {
            segment.embedding = Some(embedding);
        }

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(segments.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} segments")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        for segment in &segments {
            self.store.upsert_segment(segment)?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!("Ingested {} segments from {}", segments.len(), source_url);
        Ok(segments.len())
    }
}
