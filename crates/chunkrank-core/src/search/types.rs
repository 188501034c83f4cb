use super::conditions::ConditionSet;
use super::options::SearchMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Neutral importance value; chunks at this level are not re-weighted.
pub const NEUTRAL_IMPORTANCE: u8 = 100;

/// Highest importance a chunk can carry.
pub const MAX_IMPORTANCE: u8 = 200;

/// Stable chunk identifier derived from the chunk text.
///
/// Ids produced by [`ChunkId::from_text`] are the lowercase hex blake3 digest
/// of the text, so the same text always maps to the same id across runs.
///
/// # Examples
///
/// ```
/// use chunkrank_core::ChunkId;
///
/// let a = ChunkId::from_text("The dragon sleeps under the mountain.");
/// let b = ChunkId::from_text("The dragon sleeps under the mountain.");
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Content hash of `text`.
    pub fn from_text(text: &str) -> Self {
        Self(blake3::hash(text.as_bytes()).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a chunk's text originally came from.
///
/// Temporal decay only applies to [`ChunkSource::Chat`] chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSource {
    /// A chat message
    Chat,
    /// A lorebook / world-info entry
    Lorebook,
    /// An attached document
    #[default]
    Document,
    /// A character card field
    Character,
    /// Anything else supplied by the caller
    Custom,
}

impl fmt::Display for ChunkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chat => "chat",
            Self::Lorebook => "lorebook",
            Self::Document => "document",
            Self::Character => "character",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Named cluster of chunks that boost together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkGroup {
    /// Group name; chunks sharing a name belong to the same group
    pub name: String,
    /// Keywords that trigger the group boost when found in the query
    #[serde(default)]
    pub group_keywords: Vec<String>,
    /// When set, at least one member must appear in every result set
    #[serde(default)]
    pub requires_group_member: bool,
}

impl ChunkGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_keywords: Vec::new(),
            requires_group_member: false,
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(mut self) -> Self {
        self.requires_group_member = true;
        self
    }
}

/// A unit of retrievable text.
///
/// Chunks are supplied by the caller on every search and are never mutated by
/// the engine. Scoring state lives in [`ScoredChunk`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Content hash of the text
    #[serde(default)]
    pub id: ChunkId,
    /// Chunk text (non-empty)
    pub text: String,
    /// Optional embedding; fixed dimension within a collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Author-assigned keywords, in priority order
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Keywords assigned by the system (e.g. extracted at ingest time)
    #[serde(default)]
    pub system_keywords: Vec<String>,
    /// Importance on a 0-200 scale, 100 is neutral
    #[serde(default = "default_importance")]
    pub importance: u8,
    /// Disabled chunks are never force-included
    #[serde(default)]
    pub disabled: bool,
    /// Activation conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionSet>,
    /// Group membership
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_group: Option<ChunkGroup>,
    /// Whether this chunk is a generated summary of `parent_id`
    #[serde(default)]
    pub is_summary_chunk: bool,
    /// Parent chunk of a summary chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ChunkId>,
    /// Owning collection, used to fetch missing embeddings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    /// Origin of the chunk text
    #[serde(default)]
    pub source: ChunkSource,
    /// Originating chat message index (chat chunks only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_index: Option<u64>,
    /// Section label matched by `chunkActive` rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Topic label matched by `chunkActive` rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

fn default_importance() -> u8 {
    NEUTRAL_IMPORTANCE
}

impl Chunk {
    /// Creates a chunk whose id is the content hash of `text`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: ChunkId::from_text(&text),
            text,
            embedding: None,
            keywords: Vec::new(),
            system_keywords: Vec::new(),
            importance: NEUTRAL_IMPORTANCE,
            disabled: false,
            conditions: None,
            chunk_group: None,
            is_summary_chunk: false,
            parent_id: None,
            collection_id: None,
            source: ChunkSource::default(),
            message_index: None,
            section: None,
            topic: None,
        }
    }

    /// Sets the author keywords (lowercased and trimmed).
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = normalize_terms(keywords);
        self
    }

    /// Sets the system keywords (lowercased and trimmed).
    pub fn with_system_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.system_keywords = normalize_terms(keywords);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Sets the importance, clamped to `0..=200`.
    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.min(MAX_IMPORTANCE);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn with_group(mut self, group: ChunkGroup) -> Self {
        self.chunk_group = Some(group);
        self
    }

    /// Marks this chunk as a summary of `parent`.
    pub fn summary_of(mut self, parent: &ChunkId) -> Self {
        self.is_summary_chunk = true;
        self.parent_id = Some(parent.clone());
        self
    }

    pub fn in_collection(mut self, collection_id: impl Into<String>) -> Self {
        self.collection_id = Some(collection_id.into());
        self
    }

    /// Marks this chunk as originating from chat message `message_index`.
    pub fn from_chat(mut self, message_index: u64) -> Self {
        self.source = ChunkSource::Chat;
        self.message_index = Some(message_index);
        self
    }

    pub fn with_source(mut self, source: ChunkSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Importance clamped to the documented `0..=200` range.
    pub fn importance(&self) -> u8 {
        self.importance.min(MAX_IMPORTANCE)
    }

    /// Whether the chunk carries a non-empty embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Whether the chunk carries any author or system keywords.
    pub fn has_keywords(&self) -> bool {
        self.keywords.iter().chain(&self.system_keywords).any(|k| !k.trim().is_empty())
    }
}

fn normalize_terms<I, S>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Importance bucket used by the optional tier re-rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceTier {
    /// importance >= 175
    Critical,
    /// importance >= 125
    High,
    /// importance >= 75
    Normal,
    /// everything below
    Low,
}

impl ImportanceTier {
    pub fn from_importance(importance: u8) -> Self {
        match importance {
            175.. => Self::Critical,
            125..=174 => Self::High,
            75..=124 => Self::Normal,
            _ => Self::Low,
        }
    }
}

/// A chunk plus the transient scoring state accumulated by the pipeline.
///
/// These fields only exist for the duration of one search call and are never
/// written back to the chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// The chunk being ranked
    pub chunk: Chunk,
    /// Final score, adjusted by each pipeline stage
    pub score: f32,
    /// Keyword match score in `[0, 1]`
    pub keyword_score: Option<f32>,
    /// Vector score used for fusion
    pub vector_score: Option<f32>,
    /// Raw similarity against the query embedding
    pub similarity: Option<f32>,
    /// Reciprocal-rank-fusion score (dual-vector search)
    pub rrf_score: Option<f32>,
    /// Chunk keywords matched by the query
    pub matched_keywords: Vec<String>,
    /// Summary chunk whose embedding contributed to this result
    pub via_summary: Option<ChunkId>,
    /// Score was multiplied by a group boost
    pub group_boosted: bool,
    /// Importance weighting changed the score
    pub importance_applied: bool,
    /// Temporal decay changed the score
    pub decay_applied: bool,
    /// Name of the required group that force-included this chunk
    pub forced_by_group: Option<String>,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            keyword_score: None,
            vector_score: None,
            similarity: None,
            rrf_score: None,
            matched_keywords: Vec::new(),
            via_summary: None,
            group_boosted: false,
            importance_applied: false,
            decay_applied: false,
            forced_by_group: None,
        }
    }

    pub fn id(&self) -> &ChunkId {
        &self.chunk.id
    }
}

/// Per-phase wall-clock timings of one search, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchTiming {
    pub total_ms: f64,
    pub conditions_ms: f64,
    pub keyword_ms: f64,
    pub vector_ms: f64,
    pub fusion_ms: f64,
    pub pipeline_ms: f64,
}

/// Counters describing how a search narrowed the chunk set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchStats {
    /// Mode the search actually ran in
    pub mode: SearchMode,
    /// Chunks supplied by the caller
    pub total_chunks: usize,
    /// Chunks removed by the condition filter
    pub filtered_by_conditions: usize,
    /// Extracted query keywords
    pub query_keywords: usize,
    /// Chunks with a positive keyword score
    pub keyword_candidates: usize,
    /// Chunks ranked by the vector matcher
    pub vector_candidates: usize,
    /// Candidates after fusion
    pub merged_candidates: usize,
    /// Candidates at or above the threshold
    pub above_threshold: usize,
    /// Chunks appended by required-group enforcement
    pub forced_by_group: usize,
    /// Results returned to the caller
    pub returned: usize,
    /// Whether the query embedding came from the cache
    pub embedding_cache_hit: bool,
    /// Chunk embeddings fetched from vector enrichment
    pub enriched_embeddings: usize,
}

impl SearchStats {
    pub fn new(mode: SearchMode, total_chunks: usize) -> Self {
        Self {
            mode,
            total_chunks,
            filtered_by_conditions: 0,
            query_keywords: 0,
            keyword_candidates: 0,
            vector_candidates: 0,
            merged_candidates: 0,
            above_threshold: 0,
            forced_by_group: 0,
            returned: 0,
            embedding_cache_hit: false,
            enriched_embeddings: 0,
        }
    }
}

/// Result of a single search call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    /// Ranked results
    pub results: Vec<ScoredChunk>,
    /// Per-phase timings
    pub timing: SearchTiming,
    /// Per-stage counters
    pub stats: SearchStats,
}
