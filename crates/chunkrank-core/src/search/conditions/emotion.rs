//! Emotion detection for `emotion` condition rules.

use crate::search::context::SearchContext;

/// Messages inspected by [`KeywordEmotionDetector`].
const EMOTION_SCAN_DEPTH: usize = 5;

/// Lexicon in priority order; earlier emotions win ties.
const LEXICON: &[(&str, &[&str])] = &[
    (
        "joy",
        &["happy", "glad", "joy", "joyful", "laugh", "laughs", "smile", "smiles", "delighted", "cheerful"],
    ),
    (
        "sadness",
        &["sad", "cry", "cries", "crying", "tears", "grief", "sorrow", "miserable", "weep"],
    ),
    (
        "anger",
        &["angry", "furious", "rage", "mad", "shout", "shouts", "yell", "glare", "glares"],
    ),
    (
        "fear",
        &["afraid", "scared", "fear", "terrified", "tremble", "trembles", "panic", "nervous"],
    ),
    (
        "surprise",
        &["surprised", "shocked", "astonished", "gasp", "gasps", "stunned"],
    ),
    (
        "love",
        &["love", "adore", "affection", "kiss", "kisses", "blush", "blushes"],
    ),
    (
        "disgust",
        &["disgust", "disgusted", "gross", "revolting", "sickening"],
    ),
];

/// Reports the current emotion of a character.
///
/// Implementations are injected at engine construction. When a detector
/// returns `None` the engine falls back to [`KeywordEmotionDetector`].
pub trait EmotionDetector: Send + Sync {
    /// Emotion label of `character` (or of the chat as a whole when `None`).
    fn current_emotion(&self, character: Option<&str>, ctx: &SearchContext) -> Option<String>;
}

/// Detector that never reports an emotion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmotionDetector;

impl EmotionDetector for NoEmotionDetector {
    fn current_emotion(&self, _character: Option<&str>, _ctx: &SearchContext) -> Option<String> {
        None
    }
}

/// Counts lexicon words in the character's recent messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordEmotionDetector;

impl EmotionDetector for KeywordEmotionDetector {
    fn current_emotion(&self, character: Option<&str>, ctx: &SearchContext) -> Option<String> {
        let mut counts = [0usize; LEXICON.len()];

        let messages = ctx.recent(EMOTION_SCAN_DEPTH).iter().filter(|m| {
            character.map_or(true, |name| m.speaker.eq_ignore_ascii_case(name))
        });
        for message in messages {
            let text = message.text.to_lowercase();
            for word in text.split(|c: char| !c.is_alphanumeric()) {
                for (slot, (_, words)) in counts.iter_mut().zip(LEXICON) {
                    if words.contains(&word) {
                        *slot += 1;
                    }
                }
            }
        }

        let mut best: Option<(usize, usize)> = None;
        for (index, &count) in counts.iter().enumerate() {
            if count > 0 && best.map_or(true, |(_, c)| count > c) {
                best = Some((index, count));
            }
        }
        best.map(|(index, _)| LEXICON[index].0.to_string())
    }
}
