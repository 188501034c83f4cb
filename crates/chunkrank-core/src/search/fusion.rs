//! Result-list fusion.
//!
//! Two merge strategies are kept distinct on purpose:
//!
//! - [`weighted_reciprocal_rank_fusion`] merges two rankings of the same signal
//!   at different granularity (summary vs full-text embeddings). Only ranks
//!   matter.
//! - [`weighted_score_fusion`] merges two different signals (keyword and
//!   vector scores) by a weighted sum of the scores themselves.
//!
//! Both are deterministic: ties keep the order in which items were first seen
//! (list A before list B).

use std::collections::HashMap;
use std::hash::Hash;

/// Standard RRF k parameter value from academic literature.
///
/// This constant (60) is the recommended value from the original RRF paper:
/// "Reciprocal Rank Fusion outperforms Condorcet and individual Rank Learning Methods"
/// by Cormack, Clarke, and Buettcher (SIGIR 2009).
///
/// Smaller k puts more emphasis on top results; larger k weights ranks more
/// uniformly.
pub const RRF_K: usize = 60;

/// Unweighted RRF; see [`weighted_reciprocal_rank_fusion`].
pub fn reciprocal_rank_fusion<T: Clone + Eq + Hash>(
    results_a: &[(T, f32)],
    results_b: &[(T, f32)],
    k: usize,
) -> Vec<(T, f32)> {
    weighted_reciprocal_rank_fusion(results_a, results_b, k, 1.0, 1.0)
}

/// Combines two rankings with weighted Reciprocal Rank Fusion.
///
/// An item at 0-based rank `r` in a list of weight `w` contributes
/// `w / (k + r + 1)`. Contributions are summed per item; items present in one
/// list only keep that list's contribution. The input scores are ignored.
///
/// Returns `(item, fused score)` sorted by fused score descending, ties in
/// first-seen order.
///
/// # Examples
///
/// ```
/// use chunkrank_core::search::fusion::weighted_reciprocal_rank_fusion;
///
/// let summary = vec![("s", 0.9)];
/// let full = vec![("f", 0.95)];
/// let fused = weighted_reciprocal_rank_fusion(&summary, &full, 60, 1.5, 1.0);
///
/// assert_eq!(fused[0].0, "s");
/// assert!((fused[0].1 - 1.5 / 61.0).abs() < 1e-6);
/// assert!((fused[1].1 - 1.0 / 61.0).abs() < 1e-6);
/// ```
pub fn weighted_reciprocal_rank_fusion<T: Clone + Eq + Hash>(
    results_a: &[(T, f32)],
    results_b: &[(T, f32)],
    k: usize,
    weight_a: f32,
    weight_b: f32,
) -> Vec<(T, f32)> {
    let k_param = k as f32;

    let mut slots: HashMap<T, usize> = HashMap::new();
    let mut combined: Vec<(T, f32)> = Vec::new();

    for (results, weight) in [(results_a, weight_a), (results_b, weight_b)] {
        for (rank, (item, _score)) in results.iter().enumerate() {
            let contribution = weight / (k_param + rank as f32 + 1.0);
            match slots.get(item) {
                Some(&slot) => combined[slot].1 += contribution,
                None => {
                    slots.insert(item.clone(), combined.len());
                    combined.push((item.clone(), contribution));
                }
            }
        }
    }

    combined.sort_by(|a, b| b.1.total_cmp(&a.1));
    combined
}

/// An item merged by [`weighted_score_fusion`].
#[derive(Debug, Clone, PartialEq)]
pub struct FusedScore<T> {
    pub item: T,
    /// `a · weight_a + b · weight_b`
    pub score: f32,
    /// Score from list A, if the item appeared there
    pub a: Option<f32>,
    /// Score from list B, if the item appeared there
    pub b: Option<f32>,
}

/// Merges two scored lists with a weighted sum.
///
/// Takes the union of both lists; an item missing from one side contributes 0
/// for that side. Duplicates within a list keep their first occurrence.
/// Returns items sorted by combined score descending, ties in first-seen order.
///
/// # Examples
///
/// ```
/// use chunkrank_core::search::fusion::weighted_score_fusion;
///
/// let keyword = vec![(1, 1.0)];
/// let vector = vec![(1, 0.5), (2, 0.9)];
/// let fused = weighted_score_fusion(&keyword, &vector, 0.3, 0.7);
///
/// // 1: 1.0 * 0.3 + 0.5 * 0.7, 2: 0.9 * 0.7
/// assert_eq!(fused[0].item, 1);
/// assert!((fused[0].score - 0.65).abs() < 1e-6);
/// assert_eq!(fused[1].item, 2);
/// assert_eq!(fused[1].a, None);
/// ```
pub fn weighted_score_fusion<T: Clone + Eq + Hash>(
    results_a: &[(T, f32)],
    results_b: &[(T, f32)],
    weight_a: f32,
    weight_b: f32,
) -> Vec<FusedScore<T>> {
    let mut slots: HashMap<T, usize> = HashMap::new();
    let mut merged: Vec<FusedScore<T>> = Vec::new();

    for (item, score) in results_a {
        if slots.contains_key(item) {
            continue;
        }
        slots.insert(item.clone(), merged.len());
        merged.push(FusedScore {
            item: item.clone(),
            score: 0.0,
            a: Some(*score),
            b: None,
        });
    }
    for (item, score) in results_b {
        match slots.get(item) {
            Some(&slot) => {
                if merged[slot].b.is_none() {
                    merged[slot].b = Some(*score);
                }
            }
            None => {
                slots.insert(item.clone(), merged.len());
                merged.push(FusedScore {
                    item: item.clone(),
                    score: 0.0,
                    a: None,
                    b: Some(*score),
                });
            }
        }
    }

    for fused in &mut merged {
        fused.score = fused.a.unwrap_or(0.0) * weight_a + fused.b.unwrap_or(0.0) * weight_b;
    }
    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged
}
