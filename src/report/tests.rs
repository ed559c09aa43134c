use super::*;
use crate::models::SegmentMetadata;
use chrono::TimeDelta;

fn result(id: &str, score: f32) -> ScoredResult {
    ScoredResult::new(
        id.to_string(),
        format!("Content for {id} long enough to keep"),
        "https://example.com/docs".to_string(),
        SegmentMetadata {
            title: "Docs".to_string(),
            created_at: "2026-08-25T00:00:00Z".to_string(),
        },
        score,
    )
    .expect("valid result")
}

fn detail(id: &str, content_valid: bool, metadata_valid: bool) -> ResultValidation {
    ResultValidation {
        id: id.to_string(),
        content_valid,
        metadata_valid,
        errors: Vec::new(),
    }
}

#[test]
fn zero_results_report_trivial_accuracy() {
    let report = build_report("unmatched query", &[], &[], None, None);

    assert!(report.validation_passed);
    assert_eq!(report.results_count, 0);
    assert!((report.accuracy_score - 1.0).abs() < f32::EPSILON);
    assert!((report.details.accuracy_breakdown.content_accuracy - 1.0).abs() < f32::EPSILON);
    assert!((report.details.accuracy_breakdown.metadata_accuracy - 1.0).abs() < f32::EPSILON);
    assert!(report.performance_metrics.duration_ms.is_none());
    assert!(report.performance_metrics.results_per_second.abs() < f64::EPSILON);
}

#[test]
fn mixed_outcomes_produce_fractional_accuracy() {
    let results = vec![result("p1", 0.9), result("p2", 0.7)];
    let details = vec![detail("p1", true, true), detail("p2", true, false)];

    let report = build_report("query", &results, &details, None, None);

    assert!(!report.validation_passed);
    assert!((report.accuracy_score - 0.5).abs() < f32::EPSILON);
    assert_eq!(report.details.passed_count, 1);
    assert_eq!(report.details.failed_count, 1);
    assert!((report.details.accuracy_breakdown.content_accuracy - 1.0).abs() < f32::EPSILON);
    assert!((report.details.accuracy_breakdown.metadata_accuracy - 0.5).abs() < f32::EPSILON);
}

#[test]
fn all_passing_results_pass_validation() {
    let results = vec![result("p1", 0.9), result("p2", 0.7)];
    let details = vec![detail("p1", true, true), detail("p2", true, true)];

    let report = build_report("query", &results, &details, None, None);

    assert!(report.validation_passed);
    assert!((report.accuracy_score - 1.0).abs() < f32::EPSILON);
    assert_eq!(report.details.failed_count, 0);
}

#[test]
fn timing_metrics_derive_from_the_window() {
    let start = Utc::now();
    let end = start + TimeDelta::seconds(2);
    let results = vec![
        result("p1", 0.8),
        result("p2", 0.8),
        result("p3", 0.8),
        result("p4", 0.8),
    ];
    let details: Vec<ResultValidation> = results
        .iter()
        .map(|r| detail(r.id(), true, true))
        .collect();

    let report = build_report("query", &results, &details, Some(start), Some(end));

    assert_eq!(report.performance_metrics.duration_ms, Some(2000.0));
    assert!((report.performance_metrics.results_per_second - 2.0).abs() < 1e-9);
    assert!(
        (report.performance_metrics.average_similarity_score - 0.8).abs() < f32::EPSILON
    );
}

#[test]
fn average_score_spans_all_results() {
    let results = vec![result("p1", 0.9), result("p2", 0.5)];
    let details = vec![detail("p1", true, true), detail("p2", true, true)];

    let report = build_report("query", &results, &details, None, None);

    assert!(
        (report.performance_metrics.average_similarity_score - 0.7).abs() < f32::EPSILON
    );
}

#[test]
fn failure_report_is_zero_accuracy_with_the_error() {
    let report = failure_report("broken query", "Connection refused", Some(Utc::now()));

    assert!(!report.validation_passed);
    assert_eq!(report.results_count, 0);
    assert!(report.accuracy_score.abs() < f32::EPSILON);
    assert!(report.details.accuracy_breakdown.content_accuracy.abs() < f32::EPSILON);
    assert_eq!(report.details.errors, vec!["Connection refused"]);
    assert!(report.performance_metrics.duration_ms.is_some());
}
