//! Search options.
//!
//! Every option struct deserializes from partial documents: missing fields take
//! the defaults from [`crate::config`].

use crate::config::{
    DEFAULT_BOOST_MULTIPLIER, DEFAULT_DECAY_LINEAR_RATE, DEFAULT_DECAY_MIN_RELEVANCE,
    DEFAULT_FULL_WEIGHT, DEFAULT_HALF_LIFE, DEFAULT_KEYWORD_WEIGHT, DEFAULT_MAX_GROUPS_TO_ADD,
    DEFAULT_MAX_KEYWORDS, DEFAULT_MAX_KEYWORD_LENGTH, DEFAULT_MIN_KEYWORD_LENGTH,
    DEFAULT_SUMMARY_WEIGHT, DEFAULT_THRESHOLD, DEFAULT_TOP_K, DEFAULT_VECTOR_WEIGHT,
};
use crate::error::SearchError;
use crate::search::fusion::RRF_K;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which matcher(s) a search runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Keyword trie matching only
    Keyword,
    /// Embedding similarity only
    Vector,
    /// Both, merged by weighted sum
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "vector" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(SearchError::InvalidSearchMode(s.to_string())),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        })
    }
}

/// Vector similarity function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityAlgorithm {
    #[default]
    Cosine,
    Jaccard,
    Hamming,
}

impl FromStr for SimilarityAlgorithm {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "jaccard" => Ok(Self::Jaccard),
            "hamming" => Ok(Self::Hamming),
            other => Err(SearchError::InvalidOptions(format!(
                "unknown similarity algorithm '{other}'"
            ))),
        }
    }
}

/// Which chunks the vector matcher ranks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorScope {
    /// Summary chunks only
    Summary,
    /// Non-summary chunks only
    Full,
    /// Every chunk
    #[default]
    Both,
}

/// Temporal decay curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayMode {
    #[default]
    Exponential,
    Linear,
}

/// Query keyword extraction limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordOptions {
    pub min_length: usize,
    pub max_length: usize,
    pub max_keywords: usize,
    /// Let query keywords match chunk keywords by prefix (weight 0.8)
    pub prefix_matching: bool,
}

impl Default for KeywordOptions {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_KEYWORD_LENGTH,
            max_length: DEFAULT_MAX_KEYWORD_LENGTH,
            max_keywords: DEFAULT_MAX_KEYWORDS,
            prefix_matching: true,
        }
    }
}

/// Per-keyword priority hints.
///
/// Terms are compared case-insensitively against the extracted query keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordPriorities {
    /// Character names, weighted as critical
    pub character_names: Vec<String>,
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub low: Vec<String>,
    /// Treat `[tag|tag]` annotations in the query as high priority
    pub detect_bracket_tags: bool,
    /// Treat capitalized two-word sequences in the query as high priority
    pub detect_named_entities: bool,
}

impl Default for KeywordPriorities {
    fn default() -> Self {
        Self {
            character_names: Vec::new(),
            critical: Vec::new(),
            high: Vec::new(),
            low: Vec::new(),
            detect_bracket_tags: true,
            detect_named_entities: true,
        }
    }
}

/// Temporal decay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayOptions {
    pub mode: DecayMode,
    /// Messages until the exponential multiplier halves
    pub half_life: f32,
    /// Linear multiplier lost per message of age
    pub linear_rate: f32,
    /// Lower bound of the decay multiplier
    pub min_relevance: f32,
    /// Measure age from the start of the current scene when scenes differ
    pub scene_aware: bool,
}

impl Default for DecayOptions {
    fn default() -> Self {
        Self {
            mode: DecayMode::Exponential,
            half_life: DEFAULT_HALF_LIFE,
            linear_rate: DEFAULT_DECAY_LINEAR_RATE,
            min_relevance: DEFAULT_DECAY_MIN_RELEVANCE,
            scene_aware: false,
        }
    }
}

/// Chunk group boost and enforcement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupOptions {
    pub boost_multiplier: f32,
    /// Force-include a member of every required group missing from the results
    pub enforce_required: bool,
    /// Upper bound on force-included chunks per search
    pub max_to_add: usize,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            boost_multiplier: DEFAULT_BOOST_MULTIPLIER,
            enforce_required: true,
            max_to_add: DEFAULT_MAX_GROUPS_TO_ADD,
        }
    }
}

/// Summary + full-text fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualVectorOptions {
    pub summary_weight: f32,
    pub full_weight: f32,
    pub rrf_k: usize,
}

impl Default for DualVectorOptions {
    fn default() -> Self {
        Self {
            summary_weight: DEFAULT_SUMMARY_WEIGHT,
            full_weight: DEFAULT_FULL_WEIGHT,
            rrf_k: RRF_K,
        }
    }
}

/// Options for a single search call.
///
/// # Examples
///
/// ```
/// use chunkrank_core::{SearchMode, SearchOptions};
///
/// let options: SearchOptions = serde_json::from_str(r#"{"search_mode": "keyword", "top_k": 3}"#).unwrap();
/// assert_eq!(options.search_mode, SearchMode::Keyword);
/// assert_eq!(options.top_k, 3);
/// assert_eq!(options.threshold, 0.6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub search_mode: SearchMode,
    /// Maximum number of ranked results (required-group additions may exceed it)
    pub top_k: usize,
    /// Inclusive lower bound on the final score
    pub threshold: f32,
    pub apply_importance: bool,
    pub apply_conditions: bool,
    pub apply_groups: bool,
    pub apply_decay: bool,
    /// Re-rank the final results into importance tiers
    pub rank_by_importance_tier: bool,
    pub keyword_weight: f32,
    pub vector_weight: f32,
    /// Fuse summary and full-text hits with weighted RRF
    pub dual_vector: bool,
    pub similarity_algorithm: SimilarityAlgorithm,
    pub vector_scope: VectorScope,
    pub keywords: KeywordOptions,
    pub priorities: KeywordPriorities,
    pub decay: DecayOptions,
    pub groups: GroupOptions,
    pub dual: DualVectorOptions,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_mode: SearchMode::Hybrid,
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
            apply_importance: true,
            apply_conditions: true,
            apply_groups: true,
            apply_decay: false,
            rank_by_importance_tier: false,
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            dual_vector: false,
            similarity_algorithm: SimilarityAlgorithm::Cosine,
            vector_scope: VectorScope::Both,
            keywords: KeywordOptions::default(),
            priorities: KeywordPriorities::default(),
            decay: DecayOptions::default(),
            groups: GroupOptions::default(),
            dual: DualVectorOptions::default(),
        }
    }
}

impl SearchOptions {
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Vector search with dual-vector fusion: results rank by fused rank and
    /// `threshold` applies to raw similarity instead of the final score.
    pub fn ranks_by_fused_rank(&self) -> bool {
        self.dual_vector && self.search_mode == SearchMode::Vector
    }

    /// Checks every option against its documented range.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.top_k == 0 {
            return Err(invalid("top_k must be greater than 0"));
        }
        check_unit("threshold", self.threshold)?;
        check_unit("keyword_weight", self.keyword_weight)?;
        check_unit("vector_weight", self.vector_weight)?;
        check_unit("decay.min_relevance", self.decay.min_relevance)?;

        if self.keywords.min_length == 0 || self.keywords.min_length > self.keywords.max_length {
            return Err(invalid(format!(
                "keyword length bounds [{}, {}] are empty",
                self.keywords.min_length, self.keywords.max_length
            )));
        }
        if self.keywords.max_keywords == 0 {
            return Err(invalid("keywords.max_keywords must be greater than 0"));
        }
        if !(self.decay.half_life.is_finite() && self.decay.half_life > 0.0) {
            return Err(invalid("decay.half_life must be positive"));
        }
        if !(self.decay.linear_rate.is_finite() && self.decay.linear_rate >= 0.0) {
            return Err(invalid("decay.linear_rate must not be negative"));
        }
        if !(self.groups.boost_multiplier.is_finite() && self.groups.boost_multiplier > 0.0) {
            return Err(invalid("groups.boost_multiplier must be positive"));
        }
        for (name, weight) in [
            ("dual.summary_weight", self.dual.summary_weight),
            ("dual.full_weight", self.dual.full_weight),
        ] {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(invalid(format!("{name} must not be negative")));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> SearchError {
    SearchError::InvalidOptions(message.into())
}

fn check_unit(name: &str, value: f32) -> Result<(), SearchError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}
