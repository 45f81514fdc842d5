//! Maximal marginal relevance over nearest-neighbor candidates.
//!
//! Optional diversity pass between the vector search and the cross-encoder:
//! greedily picks candidates that balance closeness to the query against
//! redundancy with what is already picked.

use crate::segment_store::{cosine_similarity, ScoredSegment};

/// Select up to `k` candidates by maximal marginal relevance.
///
/// `lambda` weighs query relevance against diversity: 1.0 is pure relevance,
/// 0.0 is pure diversity. Candidates are expected in ascending-distance
/// order; relevance is taken as `1 - distance`.
pub fn mmr_select(candidates: &[ScoredSegment], lambda: f32, k: usize) -> Vec<ScoredSegment> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_position = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (position, &candidate) in remaining.iter().enumerate() {
            let relevance = 1.0 - candidates[candidate].distance;
            let redundancy = selected
                .iter()
                .map(|&s| {
                    cosine_similarity(
                        &candidates[candidate].segment.embedding,
                        &candidates[s].segment.embedding,
                    )
                })
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_position = position;
            }
        }

        selected.push(remaining.swap_remove(best_position));
    }

    selected
        .into_iter()
        .map(|i| candidates[i].clone())
        .collect()
}
