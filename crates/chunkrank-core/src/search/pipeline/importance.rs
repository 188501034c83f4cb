//! Importance weighting and importance-tier ranking.

use crate::search::types::{ImportanceTier, ScoredChunk, NEUTRAL_IMPORTANCE};

/// Importance-adjusted score: `clamp01(score · i/100 + (i − 100)/1000)`.
///
/// Neutral importance (100) leaves scores in `[0, 1]` unchanged.
///
/// # Examples
///
/// ```
/// use chunkrank_core::search::pipeline::weigh_importance;
///
/// assert!((weigh_importance(0.8, 50) - 0.35).abs() < 1e-6);
/// assert_eq!(weigh_importance(0.8, 150), 1.0);
/// assert_eq!(weigh_importance(0.8, 100), 0.8);
/// ```
pub fn weigh_importance(score: f32, importance: u8) -> f32 {
    let importance = f32::from(importance);
    let adjusted = score * (importance / 100.0) + (importance - 100.0) / 1000.0;
    adjusted.clamp(0.0, 1.0)
}

/// Applies [`weigh_importance`] to every chunk.
///
/// Every score ends up in `[0, 1]`. Returns the number of non-neutral chunks,
/// which are flagged `importance_applied`.
pub fn apply_importance(results: &mut [ScoredChunk]) -> usize {
    let mut applied = 0;
    for scored in results.iter_mut() {
        let importance = scored.chunk.importance();
        scored.score = weigh_importance(scored.score, importance);
        if importance != NEUTRAL_IMPORTANCE {
            scored.importance_applied = true;
            applied += 1;
        }
    }
    applied
}

/// Stable re-rank into importance tiers, critical first, by score within a tier.
pub fn rank_by_tier(results: &mut [ScoredChunk]) {
    results.sort_by(|a, b| {
        let tier_a = ImportanceTier::from_importance(a.chunk.importance());
        let tier_b = ImportanceTier::from_importance(b.chunk.importance());
        tier_a.cmp(&tier_b).then(b.score.total_cmp(&a.score))
    });
}
