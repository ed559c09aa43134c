
use std::collections::HashSet;
use std::time::Instant;

use itertools::Itertools;
use tracing::{error, info};

use crate::config::ConsistencyConfig;
use crate::models::{ConsistencyResult, ScoredResult};
use crate::retriever::Retriever;

/// Measures retrieval stability by re-issuing one query several times.
///
/// Runs are strictly sequential: ordering is part of the signal being
/// measured, and any run may legitimately fail without aborting the rest.
pub struct ConsistencyAnalyzer<'a> {
    retriever: &'a Retriever,
    config: &'a ConsistencyConfig,
    limit: usize,
}

impl<'a> ConsistencyAnalyzer<'a> {
    #[inline]
    pub fn new(retriever: &'a Retriever, config: &'a ConsistencyConfig, limit: usize) -> Self {
        Self {
            retriever,
            config,
            limit,
        }
    }

    /// Execute `num_runs` identical searches and aggregate their agreement.
    ///
    /// A failed run is logged and excluded; when every run fails the result
    /// is a clearly marked failure rather than an error.
    #[inline]
    pub fn run(&self, query_text: &str, num_runs: usize) -> ConsistencyResult {
        info!(
            "Testing consistency for query '{}' over {} runs",
            query_text, num_runs
        );

        let mut runs = Vec::with_capacity(num_runs);

        for run_index in 0..num_runs {
            let run_start = Instant::now();
            // Raw search: the threshold floor would mask score drift between
            // runs, which is exactly what this measures.
            match self.retriever.search(query_text, self.limit, 0.0) {
                Ok(results) => {
                    info!(
                        "Run {}: {} results in {:.2}ms",
                        run_index + 1,
                        results.len(),
                        run_start.elapsed().as_secs_f64() * 1000.0
                    );
                    runs.push(results);
                }
                Err(e) => {
                    error!("Run {} failed: {}", run_index + 1, e);
                }
            }
        }

        aggregate_runs(&runs, self.config.score_std_dev_tolerance)
    }
}

/// Aggregate successful runs into a consistency verdict.
///
/// The verdict is deliberately two-factor: result counts must be stable AND
/// the pooled score standard deviation must stay under the tolerance, since
/// either dimension alone can mask instability in the embedding provider or
/// the index state.
#[inline]
pub fn aggregate_runs(runs: &[Vec<ScoredResult>], std_dev_tolerance: f64) -> ConsistencyResult {
    if runs.is_empty() {
        return ConsistencyResult {
            consistent: false,
            message: "All runs failed".to_string(),
            num_successful_runs: 0,
            avg_results_per_run: 0.0,
            similarity_std_dev: 0.0,
            result_count_consistent: false,
            consistency_percentage: 0.0,
            individual_run_results: Vec::new(),
        };
    }

    let counts: Vec<usize> = runs.iter().map(Vec::len).collect();
    let avg_results_per_run = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    let result_count_consistent = counts.iter().all_equal();

    let pooled_scores: Vec<f64> = runs
        .iter()
        .flatten()
        .map(|r| f64::from(r.similarity_score()))
        .collect();
    let similarity_std_dev = population_std_dev(&pooled_scores);

    let consistency_percentage = id_overlap(runs);

    ConsistencyResult {
        consistent: result_count_consistent && similarity_std_dev < std_dev_tolerance,
        message: format!(
            "Consistency check completed across {} successful runs",
            runs.len()
        ),
        num_successful_runs: runs.len(),
        avg_results_per_run,
        similarity_std_dev,
        result_count_consistent,
        consistency_percentage,
        individual_run_results: counts,
    }
}

/// Population standard deviation, 0 by definition when fewer than two values
/// exist.
fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;

    variance.sqrt()
}

/// Mean fraction of the first run's ids also present in each later run.
/// 1.0 when there are no comparison runs.
fn id_overlap(runs: &[Vec<ScoredResult>]) -> f64 {
    if runs.len() < 2 {
        return 1.0;
    }

    let first_ids: HashSet<&str> = runs[0].iter().map(ScoredResult::id).collect();
    if first_ids.is_empty() {
        return 1.0;
    }

    let fractions: Vec<f64> = runs[1..]
        .iter()
        .map(|run| {
            let run_ids: HashSet<&str> = run.iter().map(ScoredResult::id).collect();
            first_ids.intersection(&run_ids).count() as f64 / first_ids.len() as f64
        })
        .collect();

    fractions.iter().sum::<f64>() / fractions.len() as f64
}
