//! In-memory segment store implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_distance, Modality, ScoredSegment, Segment, SegmentStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory segment store.
pub struct MemorySegmentStore {
    segments: RwLock<HashMap<String, Segment>>,
}

impl MemorySegmentStore {
    /// Create a new in-memory segment store.
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentStore for MemorySegmentStore {
    async fn get_all(&self, video_id: &str, modality: Modality) -> Result<Vec<Segment>> {
        let segments = self.segments.read().unwrap();
        let mut result: Vec<Segment> = segments
            .values()
            .filter(|s| s.video_id == video_id && s.modality == modality)
            .cloned()
            .collect();
        result.sort_by_key(|s| s.sequence);
        Ok(result)
    }

    async fn get_window(
        &self,
        video_id: &str,
        modality: Modality,
        start: f64,
        end: f64,
    ) -> Result<Vec<Segment>> {
        let mut result = self.get_all(video_id, modality).await?;
        result.retain(|s| s.intersects(start, end));
        Ok(result)
    }

    async fn query_nearest(
        &self,
        video_id: &str,
        modality: Modality,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredSegment>> {
        let segments = self.segments.read().unwrap();

        let mut scored: Vec<ScoredSegment> = segments
            .values()
            .filter(|s| s.video_id == video_id && s.modality == modality)
            .map(|s| ScoredSegment {
                distance: cosine_distance(query_embedding, &s.embedding),
                segment: s.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn upsert_batch(&self, batch: &[Segment]) -> Result<usize> {
        let mut segments = self.segments.write().unwrap();
        for segment in batch {
            segments.insert(segment.id.to_string(), segment.clone());
        }
        Ok(batch.len())
    }

    async fn delete_by_video(&self, video_id: &str) -> Result<usize> {
        let mut segments = self.segments.write().unwrap();
        let initial_len = segments.len();
        segments.retain(|_, s| s.video_id != video_id);
        Ok(initial_len - segments.len())
    }

    async fn count(&self, video_id: &str, modality: Modality) -> Result<usize> {
        let segments = self.segments.read().unwrap();
        Ok(segments
            .values()
            .filter(|s| s.video_id == video_id && s.modality == modality)
            .count())
    }

    async fn refresh(&self) -> Result<()> {
        // A shared in-memory map always observes the latest writes.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(video: &str, modality: Modality, start: f64, end: f64, emb: Vec<f32>, seq: i64) -> Segment {
        Segment::new(video.to_string(), modality, start, end, format!("seg {}", seq), emb, seq)
    }

    #[tokio::test]
    async fn test_filters_by_video_and_modality() {
        let store = MemorySegmentStore::new();
        store
            .upsert_batch(&[
                seg("a", Modality::Speech, 0.0, 5.0, vec![1.0, 0.0], 0),
                seg("a", Modality::Visual, 1.0, 1.0, vec![0.0, 1.0], 0),
                seg("b", Modality::Speech, 0.0, 5.0, vec![1.0, 0.0], 0),
            ])
            .await
            .unwrap();

        assert_eq!(store.get_all("a", Modality::Speech).await.unwrap().len(), 1);
        assert_eq!(store.get_all("a", Modality::Visual).await.unwrap().len(), 1);
        assert_eq!(store.count("b", Modality::Visual).await.unwrap(), 0);

        // Unknown video is an empty result, not an error.
        assert!(store.get_all("missing", Modality::Speech).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_window_intersection() {
        let store = MemorySegmentStore::new();
        store
            .upsert_batch(&[
                seg("a", Modality::Speech, 0.0, 10.0, vec![1.0], 0),
                seg("a", Modality::Speech, 10.0, 20.0, vec![1.0], 1),
                seg("a", Modality::Speech, 50.0, 60.0, vec![1.0], 2),
            ])
            .await
            .unwrap();

        let hits = store.get_window("a", Modality::Speech, 5.0, 15.0).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|s| s.intersects(5.0, 15.0)));
    }

    #[tokio::test]
    async fn test_query_nearest_ordering() {
        let store = MemorySegmentStore::new();
        store
            .upsert_batch(&[
                seg("a", Modality::Speech, 0.0, 5.0, vec![1.0, 0.0], 0),
                seg("a", Modality::Speech, 5.0, 10.0, vec![0.0, 1.0], 1),
                seg("a", Modality::Speech, 10.0, 15.0, vec![0.7, 0.7], 2),
            ])
            .await
            .unwrap();

        let hits = store
            .query_nearest("a", Modality::Speech, &[1.0, 0.0], 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].segment.sequence, 0);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_delete_by_video() {
        let store = MemorySegmentStore::new();
        store
            .upsert_batch(&[
                seg("a", Modality::Speech, 0.0, 5.0, vec![1.0], 0),
                seg("a", Modality::Visual, 0.0, 0.0, vec![1.0], 0),
                seg("b", Modality::Speech, 0.0, 5.0, vec![1.0], 0),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_by_video("a").await.unwrap(), 2);
        assert_eq!(store.count("b", Modality::Speech).await.unwrap(), 1);
    }
}
