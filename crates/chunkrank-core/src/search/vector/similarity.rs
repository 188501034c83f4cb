//! Similarity functions over equal-length vectors.
//!
//! Every metric returns a similarity in `[0, 1]` where higher is more relevant,
//! so the ranking contract does not depend on which one is selected.

use crate::search::options::SimilarityAlgorithm;

/// A pluggable vector similarity.
pub trait SimilarityMetric: Send + Sync {
    /// Similarity of two equal-length vectors, in `[0, 1]`.
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32;
}

/// Cosine similarity, negative values clamped to 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl SimilarityMetric for Cosine {
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

        if mag_a == 0.0 || mag_b == 0.0 {
            return 0.0;
        }
        (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
    }
}

/// Weighted Jaccard over absolute component values: `Σ min / Σ max`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jaccard;

impl SimilarityMetric for Jaccard {
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let (mut min_sum, mut max_sum) = (0.0f32, 0.0f32);
        for (x, y) in a.iter().zip(b) {
            let (x, y) = (x.abs(), y.abs());
            min_sum += x.min(y);
            max_sum += x.max(y);
        }
        if max_sum == 0.0 {
            return 0.0;
        }
        (min_sum / max_sum).clamp(0.0, 1.0)
    }
}

/// Hamming similarity of sign-binarized vectors: share of agreeing bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hamming;

impl SimilarityMetric for Hamming {
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        if len == 0 {
            return 0.0;
        }
        let agreeing = a
            .iter()
            .zip(b)
            .filter(|(x, y)| (**x > 0.0) == (**y > 0.0))
            .count();
        agreeing as f32 / len as f32
    }
}

/// The metric implementing `algorithm`.
pub fn metric_for(algorithm: SimilarityAlgorithm) -> &'static dyn SimilarityMetric {
    match algorithm {
        SimilarityAlgorithm::Cosine => &Cosine,
        SimilarityAlgorithm::Jaccard => &Jaccard,
        SimilarityAlgorithm::Hamming => &Hamming,
    }
}
