//! Embedding-space clustering for representative segment selection.
//!
//! Summary and timestamps retrieval compress a pool of segments down to a
//! bounded set that still spans the pool's topics: k-means over the
//! embeddings, then the segment closest to each centroid. Initialization is
//! evenly spaced over the sequence-ordered pool, so the same input always
//! yields the same representatives.

use crate::segment_store::{cosine_similarity, Segment};

const MAX_ITERATIONS: usize = 10;

/// Reduce `segments` to at most `n` representatives, one per embedding
/// cluster, returned in centroid order. Downstream context keeps that
/// order, so later clusters can outrank earlier moments.
///
/// Pools no larger than `n` are returned whole, in sequence order.
/// Segments without an embedding are dropped before clustering.
pub fn cluster_representatives(segments: &[Segment], n: usize) -> Vec<Segment> {
    if n == 0 {
        return Vec::new();
    }

    let mut pool: Vec<&Segment> = segments.iter().filter(|s| !s.embedding.is_empty()).collect();
    pool.sort_by_key(|s| s.sequence);

    if pool.len() <= n {
        return pool.into_iter().cloned().collect();
    }

    let dims = pool[0].embedding.len();
    let k = n;

    // Evenly spaced seeds over the sequence-ordered pool.
    let mut centroids: Vec<Vec<f32>> = (0..k)
        .map(|i| pool[i * pool.len() / k].embedding.clone())
        .collect();

    let mut assignments = vec![0usize; pool.len()];
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, segment) in pool.iter().enumerate() {
            let nearest = nearest_centroid(&segment.embedding, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&[f32]> = pool
                .iter()
                .zip(assignments.iter())
                .filter(|(_, &a)| a == cluster)
                .map(|(s, _)| s.embedding.as_slice())
                .collect();
            // Empty clusters keep their previous centroid.
            if !members.is_empty() {
                *centroid = mean(&members, dims);
            }
        }

        if !changed {
            break;
        }
    }

    let mut result = Vec::with_capacity(k);
    for (cluster, centroid) in centroids.iter().enumerate() {
        let representative = pool
            .iter()
            .zip(assignments.iter())
            .filter(|(_, &a)| a == cluster)
            .map(|(s, _)| s)
            .max_by(|a, b| {
                let sa = cosine_similarity(&a.embedding, centroid);
                let sb = cosine_similarity(&b.embedding, centroid);
                sa.total_cmp(&sb)
            });
        if let Some(segment) = representative {
            result.push((**segment).clone());
        }
    }

    result
}

fn nearest_centroid(embedding: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_similarity = f32::NEG_INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let similarity = cosine_similarity(embedding, centroid);
        if similarity > best_similarity {
            best_similarity = similarity;
            best = i;
        }
    }
    best
}

fn mean(vectors: &[&[f32]], dims: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; dims];
    for vector in vectors {
        for (accumulator, value) in sum.iter_mut().zip(vector.iter()) {
            *accumulator += value;
        }
    }
    let count = vectors.len() as f32;
    for value in sum.iter_mut() {
        *value /= count;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_store::Modality;

    fn segment(sequence: i64, start: f64, embedding: Vec<f32>) -> Segment {
        Segment::new(
            "v".to_string(),
            Modality::Speech,
            start,
            start + 5.0,
            format!("segment {}", sequence),
            embedding,
            sequence,
        )
    }

    #[test]
    fn test_small_pool_returned_whole() {
        let segments = vec![
            segment(1, 10.0, vec![0.0, 1.0]),
            segment(0, 0.0, vec![1.0, 0.0]),
        ];
        let representatives = cluster_representatives(&segments, 5);
        assert_eq!(representatives.len(), 2);
        // Sequence order, not insertion order.
        assert_eq!(representatives[0].sequence, 0);
        assert_eq!(representatives[1].sequence, 1);
    }

    #[test]
    fn test_bounded_by_n() {
        let segments: Vec<Segment> = (0..50)
            .map(|i| {
                let angle = i as f32 * 0.1;
                segment(i, i as f64 * 5.0, vec![angle.cos(), angle.sin()])
            })
            .collect();

        let representatives = cluster_representatives(&segments, 10);
        assert!(representatives.len() <= 10);
        assert!(!representatives.is_empty());

        // One representative per cluster, no duplicates.
        let mut sequences: Vec<i64> = representatives.iter().map(|s| s.sequence).collect();
        sequences.sort_unstable();
        sequences.dedup();
        assert_eq!(sequences.len(), representatives.len());
    }

    #[test]
    fn test_centroid_order_preserved() {
        // The second cluster's members all start earlier than the first
        // cluster's representative; output must still follow cluster order.
        let segments = vec![
            segment(0, 0.0, vec![0.8, 0.6]),
            segment(1, 10.0, vec![0.0, 1.0]),
            segment(2, 20.0, vec![0.0, 1.0]),
            segment(3, 30.0, vec![0.0, 1.0]),
            segment(4, 40.0, vec![1.0, 0.0]),
            segment(5, 50.0, vec![1.0, 0.0]),
        ];

        let representatives = cluster_representatives(&segments, 2);
        assert_eq!(representatives.len(), 2);
        assert!(representatives[0].sequence >= 4);
        assert!(representatives[1].sequence <= 3);
    }

    #[test]
    fn test_picks_one_per_distinct_cluster() {
        // Two tight groups in opposite directions; ask for 2.
        let mut segments = Vec::new();
        for i in 0..10 {
            segments.push(segment(i, i as f64, vec![1.0, 0.01 * i as f32]));
        }
        for i in 10..20 {
            segments.push(segment(i, i as f64, vec![-1.0, 0.01 * i as f32]));
        }

        let representatives = cluster_representatives(&segments, 2);
        assert_eq!(representatives.len(), 2);
        let signs: Vec<bool> = representatives
            .iter()
            .map(|s| s.embedding[0] > 0.0)
            .collect();
        assert_ne!(signs[0], signs[1]);
    }

    #[test]
    fn test_deterministic() {
        let segments: Vec<Segment> = (0..30)
            .map(|i| {
                let angle = i as f32 * 0.21;
                segment(i, i as f64 * 3.0, vec![angle.cos(), angle.sin()])
            })
            .collect();

        let a: Vec<i64> = cluster_representatives(&segments, 7)
            .iter()
            .map(|s| s.sequence)
            .collect();
        let b: Vec<i64> = cluster_representatives(&segments, 7)
            .iter()
            .map(|s| s.sequence)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_n() {
        let segments = vec![segment(0, 0.0, vec![1.0, 0.0])];
        assert!(cluster_representatives(&segments, 0).is_empty());
    }
}
