
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::{RagError, Result};

/// Metadata carried alongside every stored segment and retrieved result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentMetadata {
    pub title: String,
    pub created_at: String,
}

/// A chunk of source text plus identity and metadata, the unit of storage
/// and retrieval. Identity is deterministic over `(source_url, chunk_index)`
/// so re-ingestion upserts rather than duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub id: Uuid,
    pub content: String,
    pub source_url: String,
    pub metadata: SegmentMetadata,
    pub chunk_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Output of a similarity search, immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredResult {
    id: String,
    content: String,
    source_url: String,
    metadata: SegmentMetadata,
    similarity_score: f32,
}

impl ScoredResult {
    /// Construct a result, rejecting instances that violate the data model:
    /// empty content, a malformed source URL, or incomplete metadata. The
    /// similarity score is clamped into `[0, 1]`.
    #[inline]
    pub fn new(
        id: String,
        content: String,
        source_url: String,
        metadata: SegmentMetadata,
        similarity_score: f32,
    ) -> Result<Self> {
        if id.trim().is_empty() {
            return Err(RagError::Validation("result id must be non-empty".into()));
        }

        if content.trim().is_empty() {
            return Err(RagError::Validation(format!(
                "result {id} has empty content"
            )));
        }

        let parsed = Url::parse(&source_url).map_err(|e| {
            RagError::Validation(format!("result {id} has invalid source_url: {e}"))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RagError::Validation(format!(
                "result {id} has non-http source_url: {source_url}"
            )));
        }

        if metadata.title.trim().is_empty() || metadata.created_at.trim().is_empty() {
            return Err(RagError::Validation(format!(
                "result {id} is missing required metadata fields 'title'/'created_at'"
            )));
        }

        Ok(Self {
            id,
            content,
            source_url,
            metadata,
            similarity_score: similarity_score.clamp(0.0, 1.0),
        })
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[inline]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    #[inline]
    pub fn metadata(&self) -> &SegmentMetadata {
        &self.metadata
    }

    #[inline]
    pub fn similarity_score(&self) -> f32 {
        self.similarity_score
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    Concept,
    Procedure,
    Reference,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryPriority {
    High,
    Medium,
    Low,
}

/// A predefined query used to exercise the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestQuery {
    pub id: String,
    pub text: String,
    pub expected_keywords: Vec<String>,
    pub category: QueryCategory,
    pub priority: QueryPriority,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    ContentAccuracy,
    MetadataCompleteness,
    SimilarityThreshold,
}

/// A declarative, independently enable-able correctness check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationRule {
    pub rule_id: String,
    pub rule_type: RuleType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    pub enabled: bool,
}

/// Per-result outcome of the validation engine, with explicit error tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultValidation {
    pub id: String,
    pub content_valid: bool,
    pub metadata_valid: bool,
    pub errors: Vec<String>,
}

impl ResultValidation {
    #[inline]
    pub fn passed(&self) -> bool {
        self.content_valid && self.metadata_valid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccuracyBreakdown {
    pub content_accuracy: f32,
    pub metadata_accuracy: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDetails {
    pub passed_count: usize,
    pub failed_count: usize,
    pub validation_details: Vec<ResultValidation>,
    pub accuracy_breakdown: AccuracyBreakdown,
    /// Pipeline-level errors for queries that failed outright.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub start_time: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    pub results_per_second: f64,
    pub average_similarity_score: f32,
}

/// One validation run over a single query, never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub query: String,
    pub timestamp: String,
    pub results_count: usize,
    pub validation_passed: bool,
    pub accuracy_score: f32,
    pub details: ReportDetails,
    pub performance_metrics: PerformanceMetrics,
}

/// Aggregate outcome of repeated identical searches against one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsistencyResult {
    pub consistent: bool,
    pub message: String,
    pub num_successful_runs: usize,
    pub avg_results_per_run: f64,
    pub similarity_std_dev: f64,
    pub result_count_consistent: bool,
    /// Mean fraction of the first run's ids also present in each later run.
    pub consistency_percentage: f64,
    pub individual_run_results: Vec<usize>,
}
