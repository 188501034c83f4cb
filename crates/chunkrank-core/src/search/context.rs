//! Ambient chat state supplied by the caller on every search.
//!
//! The engine never looks up chat state on its own; everything condition rules
//! and temporal decay need arrives through [`SearchContext`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A recent chat message, newest last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub speaker: String,
    pub text: String,
    #[serde(default)]
    pub is_user: bool,
}

impl ContextMessage {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            is_user: false,
        }
    }
}

/// A chunk the caller currently has injected into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveChunk {
    /// Content hash of the active chunk
    pub id: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

/// An external (lorebook / world-info) entry that is currently active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEntry {
    pub id: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Kind of generation the search is running for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    #[default]
    Normal,
    Swipe,
    Regenerate,
    Continue,
    Impersonate,
    Quiet,
}

/// A contiguous range of chat messages, `end` inclusive and open when `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub start: u64,
    #[serde(default)]
    pub end: Option<u64>,
}

impl Scene {
    pub fn contains(&self, message_index: u64) -> bool {
        message_index >= self.start && self.end.map_or(true, |end| message_index <= end)
    }
}

/// Caller-supplied state consulted by condition rules and decay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchContext {
    /// Recent messages, oldest first
    pub recent_messages: Vec<ContextMessage>,
    pub last_speaker: Option<String>,
    /// Total messages in the chat
    pub message_count: u64,
    pub active_chunks: Vec<ActiveChunk>,
    /// Participants of the chat
    pub speakers: Vec<String>,
    /// Wall-clock time of the request, used by time-of-day rules
    pub timestamp: Option<NaiveDateTime>,
    pub generation_type: GenerationType,
    pub swipe_count: u64,
    pub active_entries: Vec<ExternalEntry>,
    pub is_group_chat: bool,
    pub character_name: Option<String>,
    /// Index of the message being generated; defaults to `message_count`
    pub current_message_index: Option<u64>,
    /// Known scenes, used by scene-aware decay
    pub scenes: Vec<Scene>,
}

impl SearchContext {
    /// The last `depth` messages (all of them when `depth` is 0).
    pub fn recent(&self, depth: usize) -> &[ContextMessage] {
        if depth == 0 || depth >= self.recent_messages.len() {
            &self.recent_messages
        } else {
            &self.recent_messages[self.recent_messages.len() - depth..]
        }
    }

    pub fn current_message_index(&self) -> u64 {
        self.current_message_index.unwrap_or(self.message_count)
    }

    /// First known scene containing `message_index`.
    pub fn scene_containing(&self, message_index: u64) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.contains(message_index))
    }

    pub fn with_message(mut self, speaker: impl Into<String>, text: impl Into<String>) -> Self {
        let message = ContextMessage::new(speaker, text);
        self.last_speaker = Some(message.speaker.clone());
        self.recent_messages.push(message);
        self.message_count += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_depth() {
        let ctx = SearchContext::default()
            .with_message("Alice", "one")
            .with_message("Bob", "two")
            .with_message("Alice", "three");

        assert_eq!(ctx.recent(0).len(), 3);
        assert_eq!(ctx.recent(10).len(), 3);
        let last_two: Vec<_> = ctx.recent(2).iter().map(|m| m.text.as_str()).collect();
        assert_eq!(last_two, vec!["two", "three"]);
        assert_eq!(ctx.last_speaker.as_deref(), Some("Alice"));
        assert_eq!(ctx.current_message_index(), 3);
    }

    #[test]
    fn test_scene_lookup() {
        let ctx = SearchContext {
            scenes: vec![
                Scene { start: 0, end: Some(10) },
                Scene { start: 40, end: None },
            ],
            ..Default::default()
        };
        assert_eq!(ctx.scene_containing(5).map(|s| s.start), Some(0));
        assert_eq!(ctx.scene_containing(500).map(|s| s.start), Some(40));
        assert!(ctx.scene_containing(20).is_none());
    }
}
