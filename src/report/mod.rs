#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};

use crate::models::{
    AccuracyBreakdown, PerformanceMetrics, ReportDetails, ResultValidation, ScoredResult,
    ValidationReport,
};

/// Build a structured validation report for one query evaluation.
///
/// The accuracy denominator is `max(1, total)` so a zero-result retrieval
/// reports as trivially accurate (1.0) instead of undefined.
#[inline]
pub fn build_report(
    query: &str,
    results: &[ScoredResult],
    validation_details: &[ResultValidation],
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
) -> ValidationReport {
    let timestamp = Utc::now();

    let passed_count = validation_details.iter().filter(|d| d.passed()).count();
    let failed_count = validation_details.len() - passed_count;

    let accuracy_score = passed_count as f32 / results.len().max(1) as f32;
    let validation_passed = validation_details.iter().all(ResultValidation::passed);

    let accuracy_breakdown = if validation_details.is_empty() {
        AccuracyBreakdown {
            content_accuracy: 1.0,
            metadata_accuracy: 1.0,
        }
    } else {
        let total = validation_details.len() as f32;
        AccuracyBreakdown {
            content_accuracy: validation_details.iter().filter(|d| d.content_valid).count()
                as f32
                / total,
            metadata_accuracy: validation_details
                .iter()
                .filter(|d| d.metadata_valid)
                .count() as f32
                / total,
        }
    };

    ValidationReport {
        query: query.to_string(),
        timestamp: timestamp.to_rfc3339(),
        results_count: results.len(),
        validation_passed,
        accuracy_score,
        details: ReportDetails {
            passed_count,
            failed_count,
            validation_details: validation_details.to_vec(),
            accuracy_breakdown,
            errors: Vec::new(),
        },
        performance_metrics: performance_metrics(results, start_time, end_time, timestamp),
    }
}

/// Build a zero-accuracy failure report for a query whose evaluation failed
/// outright. Lets a batch run continue past one bad query.
#[inline]
pub fn failure_report(
    query: &str,
    error: &str,
    start_time: Option<DateTime<Utc>>,
) -> ValidationReport {
    let timestamp = Utc::now();

    ValidationReport {
        query: query.to_string(),
        timestamp: timestamp.to_rfc3339(),
        results_count: 0,
        validation_passed: false,
        accuracy_score: 0.0,
        details: ReportDetails {
            passed_count: 0,
            failed_count: 0,
            validation_details: Vec::new(),
            accuracy_breakdown: AccuracyBreakdown {
                content_accuracy: 0.0,
                metadata_accuracy: 0.0,
            },
            errors: vec![error.to_string()],
        },
        performance_metrics: performance_metrics(&[], start_time, Some(timestamp), timestamp),
    }
}

fn performance_metrics(
    results: &[ScoredResult],
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> PerformanceMetrics {
    let duration_ms = match (start_time, end_time) {
        (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64),
        (Some(start), None) => Some((now - start).num_milliseconds() as f64),
        _ => None,
    };

    let results_per_second = match duration_ms {
        Some(ms) if ms > 0.0 => results.len() as f64 / (ms / 1000.0),
        _ => 0.0,
    };

    let average_similarity_score = if results.is_empty() {
        0.0
    } else {
        results
            .iter()
            .map(ScoredResult::similarity_score)
            .sum::<f32>()
            / results.len() as f32
    };

    PerformanceMetrics {
        start_time: start_time.unwrap_or(now).to_rfc3339(),
        end_time: end_time.unwrap_or(now).to_rfc3339(),
        duration_ms,
        results_per_second,
        average_similarity_score,
    }
}
