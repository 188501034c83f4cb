//! Engine configuration.
//!
//! Default constants used by [`SearchOptions`](crate::SearchOptions) and the
//! engine, plus [`EngineConfig`], the file/environment-backed configuration
//! used by binaries embedding the engine.
//!
//! # Usage
//!
//! ```
//! use chunkrank_core::config::{DEFAULT_THRESHOLD, DEFAULT_TOP_K};
//!
//! assert_eq!(DEFAULT_TOP_K, 5);
//! assert!(DEFAULT_THRESHOLD > 0.0);
//! ```

use crate::search::SearchOptions;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Selection
// =============================================================================

/// Results returned per search.
pub const DEFAULT_TOP_K: usize = 5;

/// Inclusive minimum final score.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

// =============================================================================
// Hybrid fusion
// =============================================================================

/// Keyword share of the hybrid weighted sum.
pub const DEFAULT_KEYWORD_WEIGHT: f32 = 0.3;

/// Vector share of the hybrid weighted sum.
///
/// The two weights need not sum to 1.
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.7;

/// RRF weight of the summary list in dual-vector search.
pub const DEFAULT_SUMMARY_WEIGHT: f32 = 1.5;

/// RRF weight of the full-text list in dual-vector search.
pub const DEFAULT_FULL_WEIGHT: f32 = 1.0;

// =============================================================================
// Keywords
// =============================================================================

pub const DEFAULT_MIN_KEYWORD_LENGTH: usize = 3;
pub const DEFAULT_MAX_KEYWORD_LENGTH: usize = 50;
pub const DEFAULT_MAX_KEYWORDS: usize = 50;

// =============================================================================
// Pipeline
// =============================================================================

/// Score multiplier for chunks whose group keywords appear in the query.
pub const DEFAULT_BOOST_MULTIPLIER: f32 = 1.3;

/// Maximum chunks force-included by required groups in one search.
pub const DEFAULT_MAX_GROUPS_TO_ADD: usize = 5;

/// Messages until the exponential decay multiplier halves.
pub const DEFAULT_HALF_LIFE: f32 = 50.0;

/// Multiplier lost per message of age under linear decay.
pub const DEFAULT_DECAY_LINEAR_RATE: f32 = 0.01;

/// Floor of the decay multiplier.
pub const DEFAULT_DECAY_MIN_RELEVANCE: f32 = 0.3;

// =============================================================================
// Caching
// =============================================================================

/// Query embeddings kept in the LRU cache.
pub const DEFAULT_QUERY_CACHE_CAPACITY: usize = 100;

/// File read by [`EngineConfig::load`] when present.
pub const CONFIG_FILE_NAME: &str = "chunkrank.toml";

/// Prefix of environment variables read by [`EngineConfig::load`].
///
/// Nested keys use a double underscore, e.g. `CHUNKRANK_DEFAULTS__TOP_K=8`.
pub const ENV_PREFIX: &str = "CHUNKRANK_";

/// Engine-level configuration.
///
/// Layered with figment: built-in defaults, then the TOML file, then
/// `CHUNKRANK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the query-embedding LRU cache
    pub query_cache_capacity: usize,
    /// Seed for `randomChance` rules; unseeded uses the thread RNG
    pub random_seed: Option<u64>,
    /// Options used when the caller supplies none
    pub defaults: SearchOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
            random_seed: None,
            defaults: SearchOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Loads `chunkrank.toml` from the working directory and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(Path::new(CONFIG_FILE_NAME))
    }

    /// Loads `path` (skipped when missing) and the environment over the defaults.
    pub fn load_from(path: &Path) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
