//! Similarity ranking of index records against a query vector.

use crate::storage::{Index, IndexRecord};
use std::cmp::Ordering;

/// Number of records returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 4;

/// Cosine similarity of `a` and `b`.
///
/// Vectors of different lengths are compared over their shared prefix. A
/// zero-magnitude input, or any non-finite result, scores `0.0`. Rounding error is
/// clamped, so the result always lies in `[-1.0, 1.0]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot_product / (norm_a * norm_b);
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// A record paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<'a> {
    pub record: &'a IndexRecord,
    pub score: f32,
}

/// Orders index records by relevance to a query vector.
pub trait SimilarityRanker: Send + Sync {
    /// At most `top_k` records, best first.
    fn rank<'a>(&self, index: &'a Index, query: &[f32], top_k: usize) -> Vec<Ranked<'a>>;
}

/// Scores every record and sorts. Equal scores keep index order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScanRanker;

impl SimilarityRanker for LinearScanRanker {
    fn rank<'a>(&self, index: &'a Index, query: &[f32], top_k: usize) -> Vec<Ranked<'a>> {
        if top_k == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<Ranked<'a>> = index
            .items
            .iter()
            .map(|record| Ranked {
                record,
                score: cosine_similarity(query, &record.embedding),
            })
            .collect();

        // Stable, so ties stay in index order.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(top_k);
        ranked
    }
}
