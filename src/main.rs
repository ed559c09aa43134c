use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rag_check::commands::{ingest_file, run_consistency, run_validation, show_config, show_status};
use rag_check::models::QueryCategory;

#[derive(Parser)]
#[command(name = "rag-check")]
#[command(about = "Retrieval pipeline validation for RAG documentation indexes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the validation pipeline against the stored index
    Validate {
        /// Validate a specific ad-hoc query instead of the built-in set
        #[arg(long)]
        query: Option<String>,
        /// Restrict built-in test queries to one category
        #[arg(long, value_enum)]
        category: Option<QueryCategory>,
        /// Emit reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Measure retrieval consistency by repeating one query
    Consistency {
        /// Query to test
        #[arg(long)]
        query: String,
        /// Number of repeated runs (defaults to the configured value)
        #[arg(long)]
        runs: Option<usize>,
        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ingest a local text file as one documentation page
    Ingest {
        /// Path to the extracted page text
        file: PathBuf,
        /// Source URL the text was extracted from
        #[arg(long)]
        url: String,
        /// Page title stored in segment metadata
        #[arg(long)]
        title: Option<String>,
    },
    /// Show collection status
    Status,
    /// Show the active configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            query,
            category,
            json,
        } => {
            run_validation(query.as_deref(), category, json)?;
        }
        Commands::Consistency { query, runs, json } => {
            run_consistency(&query, runs, json)?;
        }
        Commands::Ingest { file, url, title } => {
            ingest_file(&file, &url, title.as_deref())?;
        }
        Commands::Status => {
            show_status()?;
        }
        Commands::Config => {
            show_config()?;
        }
    }

    Ok(())
}
