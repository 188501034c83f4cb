//! Condition rule types and their evaluation.

use super::emotion::EmotionDetector;
use super::random::RandomSource;
use crate::search::context::{GenerationType, SearchContext};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Messages scanned by keyword and speaker rules unless configured otherwise.
pub const DEFAULT_SCAN_DEPTH: usize = 5;

fn default_scan_depth() -> usize {
    DEFAULT_SCAN_DEPTH
}

/// One predicate over the [`SearchContext`], tagged by rule type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "settings", rename_all = "camelCase")]
pub enum RuleKind {
    Keyword(KeywordRule),
    Speaker(SpeakerRule),
    MessageCount(CountRule),
    ChunkActive(ChunkActiveRule),
    TimeOfDay(TimeOfDayRule),
    Emotion(EmotionRule),
    CharacterPresent(CharacterPresentRule),
    RandomChance(RandomChanceRule),
    GenerationType(GenerationTypeRule),
    SwipeCount(CountRule),
    LorebookActive(LorebookActiveRule),
    IsGroupChat(GroupChatRule),
}

/// How a keyword rule compares its values with message text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// A whole word equals the value
    Exact,
    /// A word starts with the value
    Prefix,
    /// A word ends with the value
    Suffix,
    /// The value occurs anywhere in the text
    #[default]
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub values: Vec<String>,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,
}

/// Whether any or every listed name must be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantifier {
    #[default]
    Any,
    All,
}

impl Quantifier {
    fn holds<I: IntoIterator<Item = bool>>(self, results: I) -> bool {
        let mut results = results.into_iter();
        match self {
            Self::Any => results.any(|r| r),
            Self::All => results.all(|r| r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerRule {
    pub names: Vec<String>,
    #[serde(default)]
    pub quantifier: Quantifier,
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountOp {
    Eq,
    Gte,
    Lte,
    /// `value..=max`
    Between,
}

/// Numeric comparison shared by message-count and swipe-count rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRule {
    pub op: CountOp,
    pub value: u64,
    #[serde(default)]
    pub max: Option<u64>,
}

impl CountRule {
    pub fn matches(&self, actual: u64) -> bool {
        match self.op {
            CountOp::Eq => actual == self.value,
            CountOp::Gte => actual >= self.value,
            CountOp::Lte => actual <= self.value,
            CountOp::Between => {
                let max = self.max.unwrap_or(u64::MAX);
                (self.value..=max).contains(&actual)
            }
        }
    }
}

/// Which attribute of an active chunk a `chunkActive` rule compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveBy {
    Hash,
    Section,
    Topic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkActiveRule {
    pub by: ActiveBy,
    pub value: String,
}

/// Inclusive `HH:MM` window; wraps past midnight when `start > end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDayRule {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRule {
    pub emotions: Vec<String>,
    /// Character whose emotion is checked; the context character when unset
    #[serde(default)]
    pub character: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterPresentRule {
    pub names: Vec<String>,
    #[serde(default)]
    pub quantifier: Quantifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomChanceRule {
    /// Pass probability in `[0, 1]`
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTypeRule {
    pub types: Vec<GenerationType>,
}

/// Matches an active external entry by id or by one of its keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LorebookActiveRule {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupChatRule {
    pub is_group_chat: bool,
}

/// Collaborators available while evaluating rules.
pub(crate) struct RuleEnv<'a> {
    pub ctx: &'a SearchContext,
    pub emotion: Option<&'a dyn EmotionDetector>,
    pub fallback_emotion: &'a dyn EmotionDetector,
    pub random: &'a dyn RandomSource,
}

impl RuleKind {
    pub(crate) fn evaluate(&self, env: &RuleEnv<'_>) -> bool {
        let ctx = env.ctx;
        match self {
            Self::Keyword(rule) => keyword_matches(rule, ctx),
            Self::Speaker(rule) => {
                let recent = ctx.recent(rule.scan_depth);
                rule.quantifier.holds(rule.names.iter().map(|name| {
                    recent.iter().any(|m| m.speaker.eq_ignore_ascii_case(name))
                }))
            }
            Self::MessageCount(rule) => rule.matches(ctx.message_count),
            Self::ChunkActive(rule) => ctx.active_chunks.iter().any(|active| match rule.by {
                ActiveBy::Hash => active.id == rule.value,
                ActiveBy::Section => eq_opt(active.section.as_deref(), &rule.value),
                ActiveBy::Topic => eq_opt(active.topic.as_deref(), &rule.value),
            }),
            Self::TimeOfDay(rule) => time_matches(rule, ctx),
            Self::Emotion(rule) => {
                let character = rule
                    .character
                    .as_deref()
                    .or(ctx.character_name.as_deref());
                let detected = env
                    .emotion
                    .and_then(|d| d.current_emotion(character, ctx))
                    .or_else(|| env.fallback_emotion.current_emotion(character, ctx));
                detected.is_some_and(|emotion| {
                    rule.emotions.iter().any(|e| e.eq_ignore_ascii_case(&emotion))
                })
            }
            Self::CharacterPresent(rule) => rule.quantifier.holds(rule.names.iter().map(|name| {
                ctx.speakers.iter().any(|s| s.eq_ignore_ascii_case(name))
                    || ctx
                        .recent_messages
                        .iter()
                        .any(|m| m.speaker.eq_ignore_ascii_case(name))
            })),
            Self::RandomChance(rule) => {
                let probability = rule.probability.clamp(0.0, 1.0);
                env.random.next_f64() < probability
            }
            Self::GenerationType(rule) => rule.types.contains(&ctx.generation_type),
            Self::SwipeCount(rule) => rule.matches(ctx.swipe_count),
            Self::LorebookActive(rule) => ctx.active_entries.iter().any(|entry| {
                entry.id == rule.value || entry.keys.iter().any(|k| k.eq_ignore_ascii_case(&rule.value))
            }),
            Self::IsGroupChat(rule) => rule.is_group_chat == ctx.is_group_chat,
        }
    }
}

fn eq_opt(actual: Option<&str>, expected: &str) -> bool {
    actual.is_some_and(|a| a.eq_ignore_ascii_case(expected))
}

fn keyword_matches(rule: &KeywordRule, ctx: &SearchContext) -> bool {
    let fold = |s: &str| {
        if rule.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    let values: Vec<String> = rule
        .values
        .iter()
        .map(|v| fold(v.trim()))
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return false;
    }

    ctx.recent(rule.scan_depth).iter().any(|message| {
        let text = fold(&message.text);
        values.iter().any(|value| match rule.match_mode {
            MatchMode::Contains => text.contains(value.as_str()),
            MatchMode::Exact => words(&text).any(|w| w == value.as_str()),
            MatchMode::Prefix => words(&text).any(|w| w.starts_with(value.as_str())),
            MatchMode::Suffix => words(&text).any(|w| w.ends_with(value.as_str())),
        })
    })
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
}

fn time_matches(rule: &TimeOfDayRule, ctx: &SearchContext) -> bool {
    let Some(now) = ctx.timestamp.map(|ts| ts.time()) else {
        return false;
    };
    let (start, end) = match (parse_hhmm(&rule.start), parse_hhmm(&rule.end)) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            warn!(start = %rule.start, end = %rule.end, "Ignoring malformed timeOfDay window");
            return false;
        }
    };
    if start <= end {
        now >= start && now <= end
    } else {
        now >= start || now <= end
    }
}

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}
