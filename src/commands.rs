use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tracing::info;

use crate::config::{Config, get_config_dir};
use crate::consistency::ConsistencyAnalyzer;
use crate::models::QueryCategory;
use crate::pipeline::{IngestPipeline, ValidationPipeline};
use crate::store::VectorStore;

/// Run the validation pipeline and print a per-query summary.
#[inline]
pub fn run_validation(
    query: Option<&str>,
    category: Option<QueryCategory>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let pipeline = ValidationPipeline::new(config).context("Failed to initialize pipeline")?;

    let reports = pipeline.run(query, category);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?
        );
        return Ok(());
    }

    for report in &reports {
        let verdict = if report.validation_passed {
            style("PASSED").green()
        } else {
            style("FAILED").red()
        };
        println!(
            "{} {} ({} results, {:.0}% accuracy)",
            verdict,
            report.query,
            report.results_count,
            report.accuracy_score * 100.0
        );
        for error in &report.details.errors {
            println!("  {}", style(error).yellow());
        }
    }

    let passed = reports.iter().filter(|r| r.validation_passed).count();
    println!();
    println!(
        "{}",
        style(format!(
            "{}/{} queries passed validation",
            passed,
            reports.len()
        ))
        .bold()
    );

    Ok(())
}

/// Run a consistency test on one query and print the verdict.
#[inline]
pub fn run_consistency(query: &str, num_runs: Option<usize>, json: bool) -> Result<()> {
    let config = load_config()?;
    let runs = num_runs.unwrap_or(config.consistency.num_runs);
    let limit = config.retrieval.max_results;
    let consistency_config = config.consistency.clone();

    let pipeline = ValidationPipeline::new(config).context("Failed to initialize pipeline")?;
    let analyzer = ConsistencyAnalyzer::new(pipeline.retriever(), &consistency_config, limit);

    let result = analyzer.run(query, runs);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
        return Ok(());
    }

    let verdict = if result.consistent {
        style("CONSISTENT").green()
    } else {
        style("INCONSISTENT").red()
    };
    println!("{} {}", verdict, query);
    println!(
        "  {} successful runs, avg {:.1} results/run",
        result.num_successful_runs, result.avg_results_per_run
    );
    println!(
        "  score std dev {:.4}, id overlap {:.0}%",
        result.similarity_std_dev,
        result.consistency_percentage * 100.0
    );

    Ok(())
}

/// Ingest a local text file as one documentation page.
#[inline]
pub fn ingest_file(path: &Path, source_url: &str, title: Option<&str>) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let title = title
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    let config = load_config()?;
    let pipeline = IngestPipeline::new(config).context("Failed to initialize ingest pipeline")?;

    let count = pipeline
        .ingest_page(&text, source_url, &title)
        .context("Ingestion failed")?;

    println!(
        "{}",
        style(format!("✓ Ingested {count} segments from {source_url}")).green()
    );
    Ok(())
}

/// Show the stored point count for the configured collection.
#[inline]
pub fn show_status() -> Result<()> {
    let config = load_config()?;
    let store = VectorStore::connect(&config.qdrant, config.retrieval.payload_content_limit)
        .context("Failed to connect to Qdrant")?;

    let count = store.count_points().context("Failed to count points")?;
    println!(
        "Collection '{}': {} points",
        style(store.collection()).cyan(),
        count
    );

    Ok(())
}

/// Print the active configuration as TOML.
#[inline]
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    let content =
        toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    println!("{content}");
    Ok(())
}

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;
    info!("Loaded configuration from {}", config_dir.display());
    Ok(config)
}
