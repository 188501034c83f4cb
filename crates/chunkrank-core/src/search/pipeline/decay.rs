//! Temporal decay of chat-sourced chunks.

use crate::search::context::SearchContext;
use crate::search::options::{DecayMode, DecayOptions};
use crate::search::types::{ChunkSource, ScoredChunk};

/// Age of a chunk from chat message `message_index`, in messages.
///
/// When scene-aware and the chunk and the current message fall in different
/// known scenes, age is measured from the start of the current scene.
pub fn message_age(message_index: u64, ctx: &SearchContext, scene_aware: bool) -> u64 {
    let current = ctx.current_message_index();
    if scene_aware {
        if let (Some(chunk_scene), Some(current_scene)) = (
            ctx.scene_containing(message_index),
            ctx.scene_containing(current),
        ) {
            if chunk_scene != current_scene {
                return current.saturating_sub(current_scene.start);
            }
        }
    }
    current.saturating_sub(message_index)
}

/// Decay multiplier for `age`, floored at `min_relevance`.
pub fn decay_multiplier(age: u64, options: &DecayOptions) -> f32 {
    let age = age as f32;
    let multiplier = match options.mode {
        DecayMode::Exponential => 0.5f32.powf(age / options.half_life),
        DecayMode::Linear => (1.0 - age * options.linear_rate).max(0.0),
    };
    multiplier.max(options.min_relevance)
}

/// Multiplies the score of every chat chunk by its decay multiplier.
///
/// Returns the number of decayed chunks.
pub fn apply_decay(results: &mut [ScoredChunk], options: &DecayOptions, ctx: &SearchContext) -> usize {
    let mut decayed = 0;
    for scored in results.iter_mut() {
        if scored.chunk.source != ChunkSource::Chat {
            continue;
        }
        let Some(message_index) = scored.chunk.message_index else {
            continue;
        };
        let multiplier = decay_multiplier(message_age(message_index, ctx, options.scene_aware), options);
        if multiplier < 1.0 {
            scored.score *= multiplier;
            scored.decay_applied = true;
            decayed += 1;
        }
    }
    decayed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::context::Scene;
    use crate::search::types::Chunk;

    fn ctx_at(current: u64) -> SearchContext {
        SearchContext {
            current_message_index: Some(current),
            scenes: vec![
                Scene { start: 0, end: Some(10) },
                Scene { start: 40, end: Some(60) },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_scene_aware_age() {
        let ctx = ctx_at(50);
        assert_eq!(message_age(5, &ctx, false), 45);
        assert_eq!(message_age(5, &ctx, true), 10);
        // same scene: plain distance
        assert_eq!(message_age(45, &ctx, true), 5);
        // chunk outside any scene: plain distance
        assert_eq!(message_age(20, &ctx, true), 30);
        // future message saturates
        assert_eq!(message_age(70, &ctx, false), 0);
    }

    #[test]
    fn test_exponential_half_life() {
        let options = DecayOptions::default();
        assert!((decay_multiplier(0, &options) - 1.0).abs() < 1e-6);
        assert!((decay_multiplier(50, &options) - 0.5).abs() < 1e-6);
        // floored at min_relevance
        assert!((decay_multiplier(500, &options) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_linear_decay() {
        let options = DecayOptions {
            mode: DecayMode::Linear,
            linear_rate: 0.01,
            min_relevance: 0.0,
            ..Default::default()
        };
        assert!((decay_multiplier(25, &options) - 0.75).abs() < 1e-6);
        assert_eq!(decay_multiplier(200, &options), 0.0);
    }

    #[test]
    fn test_only_chat_chunks_decay() {
        let ctx = ctx_at(50);
        let mut results = vec![
            ScoredChunk::new(Chunk::new("chat").from_chat(0), 0.8),
            ScoredChunk::new(Chunk::new("doc"), 0.8),
            ScoredChunk::new(Chunk::new("now").from_chat(50), 0.8),
        ];
        let decayed = apply_decay(&mut results, &DecayOptions::default(), &ctx);

        assert_eq!(decayed, 1);
        assert!((results[0].score - 0.4).abs() < 1e-6);
        assert!(results[0].decay_applied);
        assert_eq!(results[1].score, 0.8);
        assert_eq!(results[2].score, 0.8);
        assert!(!results[2].decay_applied);
    }
}
