//! Segment store abstraction for Skue.
//!
//! Provides a trait-based interface over the vector index that holds
//! time-stamped multi-modal segments per video. Retrieval is read-only;
//! writes come from the ingestion path.

mod memory;
mod sqlite;

pub use memory::MemorySegmentStore;
pub use sqlite::SqliteSegmentStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The evidence type of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Transcribed speech spans.
    Speech,
    /// Captioned visual frames.
    Visual,
}

impl Modality {
    /// Collection name used by index backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Speech => "speech",
            Modality::Visual => "visual",
        }
    }
}

impl std::str::FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "speech" => Ok(Modality::Speech),
            "visual" => Ok(Modality::Visual),
            _ => Err(format!("Unknown modality: {}", s)),
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A time-bounded unit of extracted evidence with its embedding.
///
/// Immutable once stored; uniquely identified by
/// `(video_id, modality, sequence)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Row ID.
    pub id: Uuid,
    /// Video this segment belongs to.
    pub video_id: String,
    /// Evidence type.
    pub modality: Modality,
    /// Start time in the video (seconds).
    pub start_secs: f64,
    /// End time in the video (seconds).
    pub end_secs: f64,
    /// Transcript span or frame caption.
    pub text: String,
    /// Embedding vector in the modality's space.
    pub embedding: Vec<f32>,
    /// Order of this segment within (video, modality).
    pub sequence: i64,
    /// When this segment was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Segment {
    /// Create a new segment.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        video_id: String,
        modality: Modality,
        start_secs: f64,
        end_secs: f64,
        text: String,
        embedding: Vec<f32>,
        sequence: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id,
            modality,
            start_secs,
            end_secs,
            text,
            embedding,
            sequence,
            indexed_at: Utc::now(),
        }
    }

    /// Whether `[start_secs, end_secs]` intersects the given inclusive window.
    pub fn intersects(&self, start: f64, end: f64) -> bool {
        self.end_secs >= start && self.start_secs <= end
    }
}

/// A segment with its vector distance to a query (lower is closer).
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub distance: f32,
}

/// Trait for segment store backends.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Get all segments of a modality for a video, in sequence order.
    async fn get_all(&self, video_id: &str, modality: Modality) -> Result<Vec<Segment>>;

    /// Get segments of a modality whose interval intersects the inclusive
    /// window `[start, end]`. Callers apply margin padding and duration
    /// clamping before calling.
    async fn get_window(
        &self,
        video_id: &str,
        modality: Modality,
        start: f64,
        end: f64,
    ) -> Result<Vec<Segment>>;

    /// Get the `k` segments of a modality nearest to the query embedding,
    /// ascending by distance.
    async fn query_nearest(
        &self,
        video_id: &str,
        modality: Modality,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredSegment>>;

    /// Bulk upsert segments (ingestion path).
    async fn upsert_batch(&self, segments: &[Segment]) -> Result<usize>;

    /// Delete all segments of every modality for a video.
    async fn delete_by_video(&self, video_id: &str) -> Result<usize>;

    /// Number of stored segments for a video and modality.
    async fn count(&self, video_id: &str, modality: Modality) -> Result<usize>;

    /// Re-open the underlying index so queries observe segments written
    /// since the store was constructed. Called after every successful
    /// ingestion.
    async fn refresh(&self) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance (1 - similarity), the ordering used by `query_nearest`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_intersects() {
        let seg = Segment::new(
            "v".to_string(),
            Modality::Speech,
            10.0,
            20.0,
            "hi".to_string(),
            vec![],
            0,
        );
        assert!(seg.intersects(0.0, 10.0)); // touches at start
        assert!(seg.intersects(15.0, 40.0)); // overlaps
        assert!(seg.intersects(20.0, 25.0)); // touches at end
        assert!(!seg.intersects(20.5, 25.0));
        assert!(!seg.intersects(0.0, 9.9));
    }
}
