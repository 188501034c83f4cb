//! Priority tiers for query keywords.

use super::extract::{extract_bracket_tags, extract_named_entities};
use crate::search::options::KeywordPriorities;
use serde::Serialize;
use std::collections::HashSet;

/// Priority tier of a query keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl KeywordPriority {
    /// Weight used in `Σ(match·weight) / Σweight`.
    pub fn weight(self) -> f32 {
        match self {
            Self::Critical => 2.0,
            Self::High => 1.5,
            Self::Normal => 1.0,
            Self::Low => 0.5,
        }
    }
}

/// A query keyword with its priority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedTerm {
    pub term: String,
    pub priority: KeywordPriority,
}

impl WeightedTerm {
    pub fn normal(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            priority: KeywordPriority::Normal,
        }
    }

    pub fn weight(&self) -> f32 {
        self.priority.weight()
    }
}

/// Assigns a priority to every extracted keyword of `query`.
///
/// Character names and the explicit critical list are critical; the explicit
/// high list, bracket tags in the query and words of capitalized two-word
/// sequences are high; the explicit low list is low; everything else is normal.
pub fn assign_priorities(
    query: &str,
    keywords: Vec<String>,
    priorities: &KeywordPriorities,
) -> Vec<WeightedTerm> {
    let critical = word_set(priorities.character_names.iter().chain(&priorities.critical));

    let mut high = word_set(priorities.high.iter());
    if priorities.detect_bracket_tags {
        high.extend(word_set(extract_bracket_tags(query).iter()));
    }
    if priorities.detect_named_entities {
        high.extend(word_set(extract_named_entities(query).iter()));
    }

    let low = word_set(priorities.low.iter());

    keywords
        .into_iter()
        .map(|term| {
            let priority = if critical.contains(&term) {
                KeywordPriority::Critical
            } else if high.contains(&term) {
                KeywordPriority::High
            } else if low.contains(&term) {
                KeywordPriority::Low
            } else {
                KeywordPriority::Normal
            };
            WeightedTerm { term, priority }
        })
        .collect()
}

/// Lowercased words of every phrase.
fn word_set<'a, I>(phrases: I) -> HashSet<String>
where
    I: Iterator<Item = &'a String>,
{
    phrases
        .flat_map(|phrase| phrase.split_whitespace())
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}
