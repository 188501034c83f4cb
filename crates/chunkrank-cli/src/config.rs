//! File loading for the CLI.
//!
//! Reads the engine configuration, the chunk file and the optional query
//! embedding file.

use anyhow::{anyhow, Context, Result};
use chunkrank_core::config::{EngineConfig, CONFIG_FILE_NAME};
use chunkrank_core::search::{Chunk, ChunkId};
use std::path::{Path, PathBuf};

/// Loads the engine configuration.
///
/// An explicit path must exist; without one, `chunkrank.toml` in the working
/// directory is used when present. `CHUNKRANK_*` variables apply either way.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = match path {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            path.to_path_buf()
        }
        None => PathBuf::from(CONFIG_FILE_NAME),
    };
    EngineConfig::load_from(&path)
        .with_context(|| format!("Failed to load config: {}", path.display()))
}

/// Loads a JSON array of chunks.
///
/// Chunks without an id get the content hash of their text.
pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read chunk file: {}", path.display()))?;
    let mut chunks: Vec<Chunk> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse chunk file: {}", path.display()))?;

    for chunk in chunks.iter_mut().filter(|c| c.id.is_empty()) {
        chunk.id = ChunkId::from_text(&chunk.text);
    }
    Ok(chunks)
}

/// Loads a query embedding stored as a JSON array of numbers.
pub fn load_query_vector(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read query vector: {}", path.display()))?;
    let vector: Vec<f32> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse query vector: {}", path.display()))?;
    if vector.is_empty() {
        return Err(anyhow!("Query vector is empty: {}", path.display()));
    }
    Ok(vector)
}
