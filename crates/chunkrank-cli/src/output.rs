//! Output formatting for search results.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use chunkrank_core::search::{ScoredChunk, SearchResponse};
use serde::Serialize;

/// Maximum characters to show in text snippet
const SNIPPET_MAX_LEN: usize = 200;

/// JSON output structure for search results
#[derive(Serialize)]
pub struct JsonOutput {
    pub query: String,
    pub mode: String,
    pub total_ms: f64,
    pub results: Vec<JsonResult>,
}

/// One ranked chunk in JSON format
#[derive(Serialize)]
pub struct JsonResult {
    pub id: String,
    pub score: f32,
    pub keyword_score: Option<f32>,
    pub vector_score: Option<f32>,
    pub matched_keywords: Vec<String>,
    /// Required group that force-included this chunk
    pub forced_by_group: Option<String>,
    pub snippet: String,
}

impl From<&ScoredChunk> for JsonResult {
    fn from(result: &ScoredChunk) -> Self {
        Self {
            id: result.chunk.id.to_string(),
            score: result.score,
            keyword_score: result.keyword_score,
            vector_score: result.vector_score,
            matched_keywords: result.matched_keywords.clone(),
            forced_by_group: result.forced_by_group.clone(),
            snippet: truncate_text(&result.chunk.text, SNIPPET_MAX_LEN),
        }
    }
}

/// Formats search results as JSON.
pub fn format_json(query: &str, response: &SearchResponse) -> String {
    let output = JsonOutput {
        query: query.to_string(),
        mode: response.stats.mode.to_string(),
        total_ms: response.timing.total_ms,
        results: response.results.iter().map(JsonResult::from).collect(),
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats search results for human-readable terminal output.
pub fn format_human(query: &str, response: &SearchResponse) -> String {
    let results = &response.results;
    if results.is_empty() {
        return format!("No results found for \"{}\"", query);
    }

    let mut output = String::new();
    output.push_str(&format!(
        "Found {} chunk{} for \"{}\" ({} search):\n\n",
        results.len(),
        if results.len() == 1 { "" } else { "s" },
        query,
        response.stats.mode
    ));

    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!(
            "{}. {} (score: {:.2})\n",
            i + 1,
            result.chunk.id,
            result.score
        ));

        let mut score_parts = Vec::new();
        if let Some(vs) = result.vector_score {
            score_parts.push(format!("semantic: {:.2}", vs));
        }
        if let Some(ks) = result.keyword_score {
            score_parts.push(format!("keyword: {:.2}", ks));
        }
        if !score_parts.is_empty() {
            output.push_str(&format!("   [{}]\n", score_parts.join(", ")));
        }

        if !result.matched_keywords.is_empty() {
            output.push_str(&format!(
                "   Matched: {}\n",
                result.matched_keywords.join(", ")
            ));
        }
        if let Some(group) = &result.forced_by_group {
            output.push_str(&format!("   Required by group: {}\n", group));
        }

        let snippet = truncate_text(&result.chunk.text, SNIPPET_MAX_LEN);
        output.push_str(&format!("   {}\n", indent_text(&snippet, "   ")));
        output.push('\n');
    }

    output.trim_end().to_string()
}

/// Truncates text to at most `max_len` bytes on a char boundary, preferring a
/// word boundary, and appends an ellipsis when cut.
fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &text[..end];
    match truncated.rfind(' ') {
        Some(last_space) => format!("{}...", &truncated[..last_space]),
        None => format!("{}...", truncated),
    }
}

/// Indents all lines of text after the first line.
fn indent_text(text: &str, indent: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.to_string()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
