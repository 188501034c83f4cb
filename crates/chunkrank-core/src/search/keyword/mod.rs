//! Keyword index and matcher.
//!
//! Chunks are indexed by their keyword lists (author keywords, then system
//! keywords, then bracket tags found in the chunk text) into a
//! [`KeywordTrie`]. Query keywords are extracted from the query text, assigned
//! a [`KeywordPriority`] and matched against the trie.
//!
//! # Scoring
//!
//! For every query keyword the best match in a chunk counts: an exact match
//! scores 1.0, a prefix match 0.8. Earlier chunk keywords get a positional
//! advantage, `match *= 1 - 0.3 * position / len`. The chunk score is the
//! priority-weighted mean over all query keywords,
//! `Σ(match · weight) / Σ(weight)`, clamped to `[0, 1]`. With every keyword at
//! normal priority this is `Σ match / |query keywords|`.
//!
//! # Usage
//!
//! ```
//! use chunkrank_core::search::keyword::{KeywordIndex, KeywordMatcher};
//! use chunkrank_core::search::options::{KeywordOptions, KeywordPriorities};
//!
//! let index = KeywordIndex::build(&[
//!     vec!["dragon".to_string(), "mountain".to_string()],
//!     vec!["tavern".to_string()],
//! ]);
//! let matcher = KeywordMatcher::new(KeywordOptions::default(), KeywordPriorities::default());
//! let outcome = matcher.search("Tell me about the dragon", &index);
//!
//! assert_eq!(outcome.hits.len(), 1);
//! assert_eq!(outcome.hits[0].position, 0);
//! ```

mod extract;
mod priority;
mod trie;

pub use extract::{
    extract_bracket_tags, extract_keywords, extract_named_entities, is_stop_word, strip_markup,
    STOP_WORDS,
};
pub use priority::{assign_priorities, KeywordPriority, WeightedTerm};
pub use trie::{KeywordTrie, Postings};

use crate::search::options::{KeywordOptions, KeywordPriorities};
use crate::search::types::Chunk;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Match weight of an exact keyword match.
pub const EXACT_MATCH_WEIGHT: f32 = 1.0;

/// Match weight of a prefix keyword match.
pub const PREFIX_MATCH_WEIGHT: f32 = 0.8;

/// Maximum positional penalty (last keyword of a chunk).
pub const POSITION_PENALTY: f32 = 0.3;

/// Keyword list indexed for `chunk`: author keywords, system keywords and
/// bracket tags from the text, lowercased and deduplicated in that order.
pub fn chunk_keywords(chunk: &Chunk) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let tags = extract_bracket_tags(&chunk.text);
    for keyword in chunk.keywords.iter().chain(&chunk.system_keywords).chain(&tags) {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !out.contains(&keyword) {
            out.push(keyword);
        }
    }
    out
}

/// Trie over the keyword lists of a chunk set.
#[derive(Debug, Default, Clone)]
pub struct KeywordIndex {
    trie: KeywordTrie,
    /// Keyword list length per chunk position
    lengths: Vec<usize>,
}

impl KeywordIndex {
    /// Builds the index; position `i` refers to `keyword_lists[i]`.
    #[instrument(skip_all, fields(chunks = keyword_lists.len()))]
    pub fn build(keyword_lists: &[Vec<String>]) -> Self {
        let mut trie = KeywordTrie::new();
        let mut lengths = Vec::with_capacity(keyword_lists.len());

        for (doc, keywords) in keyword_lists.iter().enumerate() {
            lengths.push(keywords.len());
            for (position, keyword) in keywords.iter().enumerate() {
                trie.insert(keyword, doc, position);
            }
        }

        debug!(keys = trie.len(), "Built keyword index");
        Self { trie, lengths }
    }

    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let lists: Vec<Vec<String>> = chunks.iter().map(chunk_keywords).collect();
        Self::build(&lists)
    }

    pub fn trie(&self) -> &KeywordTrie {
        &self.trie
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    fn positional_factor(&self, doc: usize, position: usize) -> f32 {
        let len = self.lengths.get(doc).copied().unwrap_or(0);
        if len == 0 {
            return 1.0;
        }
        1.0 - POSITION_PENALTY * (position as f32 / len as f32)
    }
}

/// A chunk matched by the query keywords.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    /// Position of the chunk in the indexed set
    pub position: usize,
    /// Weighted score in `[0, 1]`
    pub score: f32,
    /// Chunk keywords that matched, in query-keyword order
    pub matched: Vec<String>,
}

/// Result of a keyword search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordOutcome {
    /// Hits with a positive score, best first, ties in index order
    pub hits: Vec<KeywordHit>,
    /// Query keywords with their priorities
    pub terms: Vec<WeightedTerm>,
}

/// Extracts query keywords and scores indexed chunks against them.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    options: KeywordOptions,
    priorities: KeywordPriorities,
}

impl KeywordMatcher {
    pub fn new(options: KeywordOptions, priorities: KeywordPriorities) -> Self {
        Self {
            options,
            priorities,
        }
    }

    /// Query keywords of `query` with their priorities.
    pub fn query_terms(&self, query: &str) -> Vec<WeightedTerm> {
        let keywords = extract_keywords(query, &self.options);
        assign_priorities(query, keywords, &self.priorities)
    }

    #[instrument(skip_all, fields(query_len = query.len(), chunks = index.len()))]
    pub fn search(&self, query: &str, index: &KeywordIndex) -> KeywordOutcome {
        let terms = self.query_terms(query);
        let hits = self.score(&terms, index);
        debug!(
            terms = terms.len(),
            hits = hits.len(),
            "Keyword search complete"
        );
        KeywordOutcome { hits, terms }
    }

    /// Scores every indexed chunk against `terms`.
    pub fn score(&self, terms: &[WeightedTerm], index: &KeywordIndex) -> Vec<KeywordHit> {
        let total_weight: f32 = terms.iter().map(WeightedTerm::weight).sum();
        if terms.is_empty() || total_weight <= 0.0 {
            return Vec::new();
        }

        // doc -> (Σ match·weight, matched keywords)
        let mut accum: BTreeMap<usize, (f32, Vec<String>)> = BTreeMap::new();

        for term in terms {
            // doc -> (best match, keyword)
            let mut best: BTreeMap<usize, (f32, String)> = BTreeMap::new();
            let mut consider = |doc: usize, value: f32, keyword: &str| {
                let entry = best.entry(doc).or_insert((0.0, String::new()));
                if value > entry.0 {
                    *entry = (value, keyword.to_string());
                }
            };

            if let Some(postings) = index.trie.get(&term.term) {
                for (&doc, &position) in postings {
                    let value = EXACT_MATCH_WEIGHT * index.positional_factor(doc, position);
                    consider(doc, value, &term.term);
                }
            }
            if self.options.prefix_matching {
                for (keyword, postings) in index.trie.with_prefix(&term.term) {
                    if keyword == term.term {
                        continue;
                    }
                    for (&doc, &position) in postings {
                        let value = PREFIX_MATCH_WEIGHT * index.positional_factor(doc, position);
                        consider(doc, value, &keyword);
                    }
                }
            }

            for (doc, (value, keyword)) in best {
                let entry = accum.entry(doc).or_insert((0.0, Vec::new()));
                entry.0 += value * term.weight();
                if !entry.1.contains(&keyword) {
                    entry.1.push(keyword);
                }
            }
        }

        let mut hits: Vec<KeywordHit> = accum
            .into_iter()
            .map(|(position, (weighted, matched))| KeywordHit {
                position,
                score: (weighted / total_weight).clamp(0.0, 1.0),
                matched,
            })
            .filter(|hit| hit.score > 0.0)
            .collect();

        // Stable: equal scores stay in index order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits
    }
}
