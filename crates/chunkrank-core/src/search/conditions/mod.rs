//! Contextual activation conditions.
//!
//! A chunk may carry a [`ConditionSet`]: a list of [`ConditionRule`]s combined
//! with AND or OR. The condition filter drops every chunk whose enabled set
//! evaluates false against the caller's [`SearchContext`]. Chunks without
//! conditions, or with a disabled set, always pass.
//!
//! Rules are stored as `{"type": ..., "settings": {...}, "negate": bool}`:
//!
//! ```
//! use chunkrank_core::search::conditions::ConditionSet;
//!
//! let set: ConditionSet = serde_json::from_str(r#"{
//!     "enabled": true,
//!     "mode": "or",
//!     "rules": [
//!         {"type": "isGroupChat", "settings": {"is_group_chat": true}},
//!         {"type": "messageCount", "settings": {"op": "gte", "value": 10}, "negate": true}
//!     ]
//! }"#).unwrap();
//! assert_eq!(set.rules.len(), 2);
//! ```

mod emotion;
mod random;
mod rules;

pub use emotion::{EmotionDetector, KeywordEmotionDetector, NoEmotionDetector};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use rules::{
    ActiveBy, CharacterPresentRule, ChunkActiveRule, CountOp, CountRule, EmotionRule,
    GenerationTypeRule, GroupChatRule, KeywordRule, LorebookActiveRule, MatchMode, Quantifier,
    RandomChanceRule, RuleKind, SpeakerRule, TimeOfDayRule, DEFAULT_SCAN_DEPTH,
};

use crate::search::context::SearchContext;
use crate::search::types::Chunk;
use rules::RuleEnv;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// How the rules of a set combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionMode {
    /// Every rule must hold
    #[default]
    And,
    /// At least one rule must hold
    Or,
}

/// A single rule with optional negation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Invert the rule result before combination
    #[serde(default)]
    pub negate: bool,
}

impl ConditionRule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            negate: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

impl From<RuleKind> for ConditionRule {
    fn from(kind: RuleKind) -> Self {
        Self::new(kind)
    }
}

/// Activation conditions attached to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: ConditionMode,
    #[serde(default)]
    pub rules: Vec<ConditionRule>,
}

fn enabled_by_default() -> bool {
    true
}

impl ConditionSet {
    /// An enabled set combining `rules` with `mode`.
    pub fn new<I, R>(mode: ConditionMode, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ConditionRule>,
    {
        Self {
            enabled: true,
            mode,
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    pub fn all<I, R>(rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ConditionRule>,
    {
        Self::new(ConditionMode::And, rules)
    }

    pub fn any<I, R>(rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ConditionRule>,
    {
        Self::new(ConditionMode::Or, rules)
    }
}

/// Evaluates condition sets against a [`SearchContext`].
///
/// The emotion detector and random source are fixed at construction.
#[derive(Clone)]
pub struct ConditionEvaluator {
    emotion: Option<Arc<dyn EmotionDetector>>,
    random: Arc<dyn RandomSource>,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new(None, Arc::new(ThreadRandom))
    }
}

impl std::fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("custom_emotion_detector", &self.emotion.is_some())
            .finish_non_exhaustive()
    }
}

impl ConditionEvaluator {
    pub fn new(emotion: Option<Arc<dyn EmotionDetector>>, random: Arc<dyn RandomSource>) -> Self {
        Self { emotion, random }
    }

    /// Whether `chunk` may be considered in this context.
    pub fn passes(&self, chunk: &Chunk, ctx: &SearchContext) -> bool {
        match &chunk.conditions {
            Some(set) if set.enabled => self.evaluate(set, ctx),
            _ => true,
        }
    }

    /// Evaluates an enabled set. An empty rule list passes.
    pub fn evaluate(&self, set: &ConditionSet, ctx: &SearchContext) -> bool {
        if set.rules.is_empty() {
            return true;
        }
        let env = RuleEnv {
            ctx,
            emotion: self.emotion.as_deref(),
            fallback_emotion: &KeywordEmotionDetector,
            random: self.random.as_ref(),
        };
        let mut results = set
            .rules
            .iter()
            .map(|rule| rule.kind.evaluate(&env) != rule.negate);
        match set.mode {
            ConditionMode::And => results.all(|r| r),
            ConditionMode::Or => results.any(|r| r),
        }
    }

    /// Positions of the chunks that pass, in input order.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub fn filter(&self, chunks: &[Chunk], ctx: &SearchContext) -> Vec<usize> {
        let kept: Vec<usize> = chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| self.passes(chunk, ctx))
            .map(|(i, _)| i)
            .collect();
        debug!(
            kept = kept.len(),
            dropped = chunks.len() - kept.len(),
            "Condition filter applied"
        );
        kept
    }
}
