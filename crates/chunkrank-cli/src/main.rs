//! chunkrank CLI - rank a JSON chunk file against a query.
//!
//! # Usage
//!
//! ```bash
//! # Keyword search over a chunk file
//! chunkrank "where is the dragon" --chunks lore.json --mode keyword
//!
//! # Hybrid search with a precomputed query embedding
//! chunkrank "dragon lair" --chunks lore.json --query-vector query.json -n 3
//!
//! # JSON output for scripting
//! chunkrank "query" --chunks lore.json --json
//! ```

mod config;
mod output;
mod search;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Hybrid keyword + vector ranking of text chunks.
#[derive(Parser)]
#[command(name = "chunkrank", version, about)]
struct Cli {
    /// Search query
    query: String,

    /// JSON file holding an array of chunks
    #[arg(short, long)]
    chunks: PathBuf,

    /// Search mode: keyword, vector or hybrid (default: from config, else auto-detected)
    #[arg(short, long)]
    mode: Option<String>,

    /// Maximum number of results to return
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Inclusive minimum score
    #[arg(short, long)]
    threshold: Option<f32>,

    /// JSON file holding the query embedding (array of numbers)
    #[arg(long)]
    query_vector: Option<PathBuf>,

    /// Engine configuration file (default: ./chunkrank.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let request = search::SearchRequest {
        query: cli.query.clone(),
        chunks: cli.chunks,
        mode: cli.mode,
        limit: cli.limit,
        threshold: cli.threshold,
        query_vector: cli.query_vector,
        config: cli.config,
    };
    let response = search::execute_search(&request).await?;

    let output = if cli.json {
        output::format_json(&cli.query, &response)
    } else {
        output::format_human(&cli.query, &response)
    };
    println!("{}", output);

    Ok(())
}
