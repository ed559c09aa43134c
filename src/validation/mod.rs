
use itertools::Itertools;
use tracing::{debug, warn};

use crate::models::{
    QueryCategory, QueryPriority, ResultValidation, RuleType, ScoredResult, SegmentMetadata,
    TestQuery, ValidationRule,
};

/// Check retrieved content against an expected-keyword list.
///
/// Satisfied when at least `max(1, floor(len * min_ratio))` keywords appear
/// case-insensitively in the content. A majority rather than unanimity, so
/// paraphrased or partial documentation coverage still passes. An empty
/// keyword list is vacuously valid.
#[inline]
pub fn validate_text_accuracy(content: &str, expected_keywords: &[String], min_ratio: f64) -> bool {
    if expected_keywords.is_empty() {
        return true;
    }
    if content.is_empty() {
        return false;
    }

    let content_lower = content.to_lowercase();
    let found: Vec<&str> = expected_keywords
        .iter()
        .filter(|kw| content_lower.contains(&kw.to_lowercase()))
        .map(String::as_str)
        .collect();

    debug!("Matched keywords: [{}]", found.iter().join(", "));

    let required = ((expected_keywords.len() as f64 * min_ratio).floor() as usize).max(1);
    found.len() >= required
}

/// Verify metadata completeness: `title` and `created_at` must be present
/// and non-empty.
#[inline]
pub fn validate_metadata(metadata: &SegmentMetadata) -> bool {
    if metadata.title.trim().is_empty() {
        warn!("Required metadata field 'title' is empty");
        return false;
    }
    if metadata.created_at.trim().is_empty() {
        warn!("Required metadata field 'created_at' is empty");
        return false;
    }
    true
}

/// Apply content and metadata checks to a retrieved result set.
///
/// Content must be non-empty and carry enough of the query's expected
/// keywords per [`validate_text_accuracy`]. Returns the overall verdict and
/// per-item detail. An empty result set is a vacuous pass: absence of
/// matches is not a correctness failure of the validation step. Failing
/// items are enumerated with explicit error tags, never silently dropped.
#[inline]
pub fn validate_retrieved_data(
    results: &[ScoredResult],
    expected_keywords: &[String],
    min_ratio: f64,
) -> (bool, Vec<ResultValidation>) {
    if results.is_empty() {
        return (true, Vec::new());
    }

    let mut details = Vec::with_capacity(results.len());
    let mut all_valid = true;

    for result in results {
        let mut errors = Vec::new();

        let metadata_valid = validate_metadata(result.metadata());
        if !metadata_valid {
            errors.push("Metadata validation failed".to_string());
        }

        let mut content_valid = !result.content().trim().is_empty();
        if !content_valid {
            errors.push("Content is empty".to_string());
        } else if !validate_text_accuracy(result.content(), expected_keywords, min_ratio) {
            content_valid = false;
            errors.push("Content accuracy check failed".to_string());
        }

        if !(metadata_valid && content_valid) {
            all_valid = false;
        }

        details.push(ResultValidation {
            id: result.id().to_string(),
            content_valid,
            metadata_valid,
            errors,
        });
    }

    (all_valid, details)
}

/// Filter a rule set down to the rules the engine should consult.
#[inline]
pub fn enabled_rules(rules: &[ValidationRule]) -> Vec<&ValidationRule> {
    rules.iter().filter(|rule| rule.enabled).collect()
}

/// The default declarative rule set, one rule per supported rule type.
#[inline]
pub fn default_rules(similarity_threshold: f32) -> Vec<ValidationRule> {
    vec![
        ValidationRule {
            rule_id: "content-accuracy".to_string(),
            rule_type: RuleType::ContentAccuracy,
            description: "Retrieved content contains a majority of expected keywords".to_string(),
            threshold: None,
            enabled: true,
        },
        ValidationRule {
            rule_id: "metadata-completeness".to_string(),
            rule_type: RuleType::MetadataCompleteness,
            description: "Results carry non-empty title and created_at metadata".to_string(),
            threshold: None,
            enabled: true,
        },
        ValidationRule {
            rule_id: "similarity-threshold".to_string(),
            rule_type: RuleType::SimilarityThreshold,
            description: "Results score at or above the similarity floor".to_string(),
            threshold: Some(similarity_threshold),
            enabled: true,
        },
    ]
}

/// Built-in test queries exercising the common documentation categories.
#[inline]
pub fn default_test_queries() -> Vec<TestQuery> {
    vec![
        TestQuery {
            id: "tq001".to_string(),
            text: "What is the system architecture and how do its components interact?"
                .to_string(),
            expected_keywords: vec![
                "architecture".to_string(),
                "components".to_string(),
                "system".to_string(),
            ],
            category: QueryCategory::Concept,
            priority: QueryPriority::High,
        },
        TestQuery {
            id: "tq002".to_string(),
            text: "How do I install and configure the software?".to_string(),
            expected_keywords: vec![
                "install".to_string(),
                "configure".to_string(),
                "setup".to_string(),
            ],
            category: QueryCategory::Procedure,
            priority: QueryPriority::High,
        },
        TestQuery {
            id: "tq003".to_string(),
            text: "Explain how data flows through the processing pipeline".to_string(),
            expected_keywords: vec![
                "data".to_string(),
                "pipeline".to_string(),
                "flow".to_string(),
            ],
            category: QueryCategory::Concept,
            priority: QueryPriority::Medium,
        },
        TestQuery {
            id: "tq004".to_string(),
            text: "What configuration options are available?".to_string(),
            expected_keywords: vec![
                "configuration".to_string(),
                "options".to_string(),
                "default".to_string(),
            ],
            category: QueryCategory::Reference,
            priority: QueryPriority::Medium,
        },
        TestQuery {
            id: "tq005".to_string(),
            text: "How does retrieval-augmented generation work?".to_string(),
            expected_keywords: vec![
                "retrieval".to_string(),
                "generation".to_string(),
                "context".to_string(),
            ],
            category: QueryCategory::Concept,
            priority: QueryPriority::Low,
        },
    ]
}

/// Load the built-in test queries, optionally filtered by category.
#[inline]
pub fn load_test_queries(category: Option<QueryCategory>) -> Vec<TestQuery> {
    let queries = default_test_queries();
    match category {
        Some(category) => queries
            .into_iter()
            .filter(|q| q.category == category)
            .collect(),
        None => queries,
    }
}
