//! The ordered feature pipeline.
//!
//! After the matchers and fusion produced a candidate pool, the pipeline
//! adjusts and selects results in a fixed order:
//!
//! 1. group boost
//! 2. importance weighting
//! 3. temporal decay
//! 4. threshold + top-K
//! 5. required-group enforcement
//! 6. importance-tier re-rank
//!
//! Each stage can be switched off through [`SearchOptions`] but the order is
//! fixed: selection assumes final scores, enforcement assumes a selected set.
//! Condition filtering happens before the matchers run and is not part of the
//! pipeline proper.

mod decay;
mod groups;
mod importance;

pub use decay::{apply_decay, decay_multiplier, message_age};
pub use groups::{apply_group_boost, enforce_required_groups, GroupEntry, GroupIndex};
pub use importance::{apply_importance, rank_by_tier, weigh_importance};

use crate::search::context::SearchContext;
use crate::search::options::SearchOptions;
use crate::search::types::{Chunk, ScoredChunk};
use tracing::{debug, instrument};

/// Keeps results with `score >= threshold`, sorts them by score (stable) and
/// truncates to `top_k`.
///
/// Returns the number of results that passed the threshold.
pub fn select_top_k(results: &mut Vec<ScoredChunk>, threshold: f32, top_k: usize) -> usize {
    results.retain(|r| r.score >= threshold);
    let above = results.len();
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    above
}

/// Output of [`FeaturePipeline::run`].
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub results: Vec<ScoredChunk>,
    /// Candidates at or above the threshold
    pub above_threshold: usize,
    /// Chunks appended by required-group enforcement
    pub forced: usize,
}

/// Runs the enabled stages over a candidate pool.
#[derive(Debug, Clone, Copy)]
pub struct FeaturePipeline<'a> {
    options: &'a SearchOptions,
    ctx: &'a SearchContext,
}

impl<'a> FeaturePipeline<'a> {
    pub fn new(options: &'a SearchOptions, ctx: &'a SearchContext) -> Self {
        Self { options, ctx }
    }

    /// Adjusts and selects `candidates`.
    ///
    /// `universe` is the condition-filtered chunk set the candidates were
    /// drawn from; required groups pick their members from it.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub fn run(&self, mut candidates: Vec<ScoredChunk>, universe: &[Chunk], query: &str) -> PipelineOutcome {
        let options = self.options;
        let groups = if options.apply_groups {
            GroupIndex::build(universe)
        } else {
            GroupIndex::default()
        };

        if options.apply_groups && !groups.is_empty() {
            apply_group_boost(&mut candidates, &groups, query, options.groups.boost_multiplier);
        }

        if options.apply_importance {
            let applied = apply_importance(&mut candidates);
            debug!(applied, "Applied importance weighting");
        }

        if options.apply_decay {
            let decayed = apply_decay(&mut candidates, &options.decay, self.ctx);
            debug!(decayed, "Applied temporal decay");
        }

        let enforce = options.apply_groups && options.groups.enforce_required;
        let pool = if enforce { candidates.clone() } else { Vec::new() };

        // Dual-vector hits were already gated on raw similarity
        let threshold = if options.ranks_by_fused_rank() {
            f32::NEG_INFINITY
        } else {
            options.threshold
        };
        let mut results = candidates;
        let above_threshold = select_top_k(&mut results, threshold, options.top_k);

        let forced = if enforce {
            enforce_required_groups(
                &mut results,
                universe,
                &groups,
                &pool,
                options.groups.max_to_add,
            )
        } else {
            0
        };

        if options.rank_by_importance_tier {
            rank_by_tier(&mut results);
        }

        debug!(
            above_threshold,
            forced,
            returned = results.len(),
            "Pipeline complete"
        );
        PipelineOutcome {
            results,
            above_threshold,
            forced,
        }
    }
}
