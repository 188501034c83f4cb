//! Keyword extraction from free text.

use crate::search::options::KeywordOptions;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

static MARKDOWN_SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_~#>`]+").expect("valid regex"));

/// `[a|b]`, with an optional trailing `(` so markdown links can be skipped.
static BRACKET_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]]+)\](\()?").expect("valid regex"));

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+)\s+([A-Z][a-z]+)\b").expect("valid regex"));

/// Common English words never used as keywords.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "cannot", "could", "couldn't", "did", "didn't", "do", "does",
    "doesn't", "doing", "don't", "down", "during", "each", "few", "for", "from", "further", "had",
    "hadn't", "has", "hasn't", "have", "haven't", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "isn't", "it",
    "it's", "its", "itself", "just", "let's", "me", "more", "most", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "ought", "our", "ours",
    "ourselves", "out", "over", "own", "same", "she", "should", "shouldn't", "so", "some",
    "such", "than", "that", "that's", "the", "their", "theirs", "them", "themselves", "then",
    "there", "there's", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "wasn't", "we", "were", "weren't", "what", "what's", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "won't", "would",
    "wouldn't", "you", "your", "yours", "yourself", "yourselves",
];

static STOP_WORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOP_WORDS.iter().copied().collect());

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORD_SET.contains(word)
}

/// Removes HTML tags and markdown decoration, keeping link text.
pub fn strip_markup(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, " ");
    let text = MARKDOWN_LINK.replace_all(&text, "$1");
    MARKDOWN_SYMBOLS.replace_all(&text, " ").into_owned()
}

/// Extracts normalized keywords from `text`.
///
/// Lowercases, strips markup, tokenizes on whitespace and `|`, drops tokens
/// outside the configured length bounds and stop-words, deduplicates in order
/// of first appearance and caps the result at `max_keywords`.
///
/// # Examples
///
/// ```
/// use chunkrank_core::search::keyword::extract_keywords;
/// use chunkrank_core::search::options::KeywordOptions;
///
/// let keywords = extract_keywords("Tell me about <b>the</b> Dragon's hoard!", &KeywordOptions::default());
/// assert_eq!(keywords, vec!["tell", "dragon's", "hoard"]);
/// ```
pub fn extract_keywords(text: &str, options: &KeywordOptions) -> Vec<String> {
    let cleaned = strip_markup(&text.to_lowercase());
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for raw in cleaned.split(|c: char| c.is_whitespace() || c == '|') {
        let token = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let len = token.chars().count();
        if len < options.min_length || len > options.max_length || is_stop_word(token) {
            continue;
        }
        if seen.insert(token.to_string()) {
            keywords.push(token.to_string());
            if keywords.len() >= options.max_keywords {
                break;
            }
        }
    }
    keywords
}

/// Tags annotated as `[tag1|tag2]`, lowercased, skipping markdown links.
pub fn extract_bracket_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for captures in BRACKET_TAG.captures_iter(text) {
        if captures.get(2).is_some() {
            continue;
        }
        let Some(inner) = captures.get(1) else {
            continue;
        };
        for tag in inner.as_str().split('|') {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}

/// Capitalized two-word sequences (`"Aria Moonwhisper"`), lowercased.
pub fn extract_named_entities(text: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    for captures in NAMED_ENTITY.captures_iter(text) {
        let (Some(first), Some(second)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let entity = format!("{} {}", first.as_str(), second.as_str()).to_lowercase();
        if !entities.contains(&entity) {
            entities.push(entity);
        }
    }
    entities
}
