//! Vector similarity utilities.

use std::cmp::Ordering;

use fixdesk_core::knowledge::{ScoredPoint, VectorPoint};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length, empty, or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Descending score order. Total, so NaN scores sort last instead of
/// breaking the sort.
pub fn by_score_desc(a: f32, b: f32) -> Ordering {
    a.is_nan().cmp(&b.is_nan()).then_with(|| b.total_cmp(&a))
}

/// Rank points by cosine similarity to `query`, best first, at most `limit`.
///
/// The sort is stable: equal scores keep their storage order.
pub fn rank_points(points: &[VectorPoint], query: &[f32], limit: usize) -> Vec<ScoredPoint> {
    let mut scored: Vec<ScoredPoint> = points
        .iter()
        .map(|p| ScoredPoint {
            id: p.id.clone(),
            score: cosine_similarity(&p.vector, query),
            payload: p.payload.clone(),
        })
        .collect();

    scored.sort_by(|a, b| by_score_desc(a.score, b.score));
    scored.truncate(limit);
    scored
}
