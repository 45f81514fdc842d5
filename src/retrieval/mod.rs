//! Context retrieval strategies.
//!
//! Turns a [`Plan`] into the context block handed to the answer model.
//! Three strategies share the segment store:
//!
//! - summary: cluster every segment of the video for broad topic coverage
//! - timestamps: cluster only the segments intersecting a padded time window
//! - query: nearest-neighbor search refined by a cross-encoder rerank

mod cluster;
mod context;
mod mmr;

pub use cluster::cluster_representatives;
pub use context::{build_context, speech_line, visual_line};
pub use mmr::mmr_select;

use crate::config::RetrievalSettings;
use crate::embedding::{QueryEmbedder, Reranker};
use crate::error::Result;
use crate::metadata_store::VideoMetadata;
use crate::planner::Plan;
use crate::segment_store::{Modality, Segment, SegmentStore};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Retrieves and formats context for one video according to a plan.
pub struct ContextRetriever {
    store: Arc<dyn SegmentStore>,
    embedder: Arc<dyn QueryEmbedder>,
    reranker: Arc<dyn Reranker>,
    settings: RetrievalSettings,
}

impl ContextRetriever {
    /// Create a new retriever.
    pub fn new(
        store: Arc<dyn SegmentStore>,
        embedder: Arc<dyn QueryEmbedder>,
        reranker: Arc<dyn Reranker>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            reranker,
            settings,
        }
    }

    /// Retrieve context for `question` from the given video.
    ///
    /// Ignore plans yield an empty string; the orchestrator handles the
    /// no-context prompt path.
    #[instrument(skip(self, question, metadata), fields(video_id = %metadata.video_id, mode = plan.mode_name()))]
    pub async fn retrieve(
        &self,
        plan: &Plan,
        question: &str,
        metadata: &VideoMetadata,
    ) -> Result<String> {
        match plan {
            Plan::Ignore => Ok(String::new()),
            Plan::Summary => self.summary_context(metadata).await,
            Plan::Timestamps { range } => self.timestamps_context(metadata, *range).await,
            Plan::Query => self.query_context(question, metadata).await,
        }
    }

    async fn summary_context(&self, metadata: &VideoMetadata) -> Result<String> {
        let speech = self
            .store
            .get_all(&metadata.video_id, Modality::Speech)
            .await?;
        let visual = self
            .store
            .get_all(&metadata.video_id, Modality::Visual)
            .await?;

        let speech = cluster_representatives(&speech, self.settings.speech_targets);
        let visual = cluster_representatives(&visual, self.settings.visual_targets);

        debug!(
            speech = speech.len(),
            visual = visual.len(),
            "Built summary context"
        );
        Ok(build_context(Some(metadata), &speech, &visual))
    }

    async fn timestamps_context(
        &self,
        metadata: &VideoMetadata,
        range: Option<(f64, f64)>,
    ) -> Result<String> {
        // A forced timestamps mode arrives without a range; treat it as the
        // whole video.
        let (start, end) = range.unwrap_or((0.0, metadata.duration_secs));
        let margin = self.settings.window_margin_secs;
        let start = (start - margin).max(0.0);
        let end = (end + margin).min(metadata.duration_secs.max(0.0));

        let speech = self
            .store
            .get_window(&metadata.video_id, Modality::Speech, start, end)
            .await?;
        let visual = self
            .store
            .get_window(&metadata.video_id, Modality::Visual, start, end)
            .await?;

        let speech = cluster_representatives(&speech, self.settings.speech_targets);
        let visual = cluster_representatives(&visual, self.settings.visual_targets);

        debug!(
            start,
            end,
            speech = speech.len(),
            visual = visual.len(),
            "Built timestamps context"
        );
        Ok(build_context(Some(metadata), &speech, &visual))
    }

    async fn query_context(&self, question: &str, metadata: &VideoMetadata) -> Result<String> {
        let speech = self
            .rerank_modality(question, metadata, Modality::Speech, self.settings.speech_targets)
            .await?;
        let visual = self
            .rerank_modality(question, metadata, Modality::Visual, self.settings.visual_targets)
            .await?;

        debug!(
            speech = speech.len(),
            visual = visual.len(),
            "Built query context"
        );
        Ok(build_context(Some(metadata), &speech, &visual))
    }

    /// Nearest-neighbor candidates, optional MMR diversity, cross-encoder
    /// rerank, then the top `targets` in descending relevance order.
    async fn rerank_modality(
        &self,
        question: &str,
        metadata: &VideoMetadata,
        modality: Modality,
        targets: usize,
    ) -> Result<Vec<Segment>> {
        let query_embedding = self.embedder.embed_query(question, modality).await?;
        let mut candidates = self
            .store
            .query_nearest(
                &metadata.video_id,
                modality,
                &query_embedding,
                self.settings.query_candidates,
            )
            .await?;

        if self.settings.use_mmr {
            candidates = mmr_select(&candidates, self.settings.mmr_lambda, targets * 2);
        }

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.segment.text.clone()).collect();
        let scores = self.reranker.rerank(question, &texts).await?;

        let mut ranked: Vec<(f32, Segment)> = scores
            .into_iter()
            .zip(candidates.into_iter().map(|c| c.segment))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(targets);

        Ok(ranked.into_iter().map(|(_, segment)| segment).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_store::MemorySegmentStore;
    use async_trait::async_trait;

    struct UnitEmbedder;

    #[async_trait]
    impl QueryEmbedder for UnitEmbedder {
        async fn embed_query(&self, _text: &str, _modality: Modality) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Scores each text by the trailing number in it.
    struct NumberReranker;

    #[async_trait]
    impl Reranker for NumberReranker {
        async fn rerank(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>> {
            Ok(texts
                .iter()
                .map(|t| {
                    t.split_whitespace()
                        .last()
                        .and_then(|w| w.parse::<f32>().ok())
                        .unwrap_or(0.0)
                })
                .collect())
        }
    }

    fn metadata(duration: f64) -> VideoMetadata {
        VideoMetadata {
            video_id: "talk.mp4".to_string(),
            video_path: "/v/talk.mp4".to_string(),
            duration_secs: duration,
            width: 1280,
            height: 720,
            codec: "h264".to_string(),
            fps: 30.0,
            thumbnail_ref: None,
        }
    }

    fn segment(modality: Modality, sequence: i64, start: f64, text: &str) -> Segment {
        let angle = sequence as f32 * 0.3;
        Segment::new(
            "talk.mp4".to_string(),
            modality,
            start,
            start + 4.0,
            text.to_string(),
            vec![angle.cos(), angle.sin()],
            sequence,
        )
    }

    fn retriever(store: Arc<dyn SegmentStore>, settings: RetrievalSettings) -> ContextRetriever {
        ContextRetriever::new(
            store,
            Arc::new(UnitEmbedder),
            Arc::new(NumberReranker),
            settings,
        )
    }

    async fn seeded_store(speech: usize, visual: usize) -> Arc<MemorySegmentStore> {
        let store = Arc::new(MemorySegmentStore::new());
        let mut segments = Vec::new();
        for i in 0..speech {
            segments.push(segment(
                Modality::Speech,
                i as i64,
                i as f64 * 10.0,
                &format!("speech {}", i),
            ));
        }
        for i in 0..visual {
            segments.push(segment(
                Modality::Visual,
                i as i64,
                i as f64 * 10.0,
                &format!("scene {}", i),
            ));
        }
        store.upsert_batch(&segments).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_ignore_yields_empty() {
        let store = seeded_store(5, 5).await;
        let retriever = retriever(store, RetrievalSettings::default());
        let context = retriever
            .retrieve(&Plan::Ignore, "q", &metadata(100.0))
            .await
            .unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_summary_caps_per_modality() {
        let store = seeded_store(50, 20).await;
        let settings = RetrievalSettings {
            speech_targets: 5,
            visual_targets: 3,
            ..Default::default()
        };
        let retriever = retriever(store, settings);

        let context = retriever
            .retrieve(&Plan::Summary, "q", &metadata(500.0))
            .await
            .unwrap();

        let speech_lines = context.matches("At ").count()
            - context
                .split("Relevant Visual Scenes:")
                .nth(1)
                .map(|s| s.matches("At ").count())
                .unwrap_or(0);
        let visual_lines = context
            .split("Relevant Visual Scenes:")
            .nth(1)
            .map(|s| s.matches("At ").count())
            .unwrap_or(0);
        assert!(speech_lines <= 5);
        assert!(visual_lines <= 3);
        assert!(context.starts_with("Video Information of talk.mp4:"));
    }

    #[tokio::test]
    async fn test_timestamps_window_filters() {
        let store = seeded_store(50, 0).await;
        let settings = RetrievalSettings {
            speech_targets: 45,
            window_margin_secs: 0.0,
            ..Default::default()
        };
        let retriever = retriever(store, settings);

        // Segments at 100..=140 start seconds intersect [100, 140].
        let context = retriever
            .retrieve(
                &Plan::Timestamps {
                    range: Some((100.0, 140.0)),
                },
                "q",
                &metadata(500.0),
            )
            .await
            .unwrap();

        assert!(context.contains("speech 10"));
        assert!(context.contains("speech 14"));
        assert!(!context.contains("speech 20"));
    }

    #[tokio::test]
    async fn test_timestamps_without_range_covers_whole_video() {
        let store = seeded_store(10, 0).await;
        let retriever = retriever(store, RetrievalSettings::default());

        let context = retriever
            .retrieve(&Plan::Timestamps { range: None }, "q", &metadata(500.0))
            .await
            .unwrap();

        assert!(context.contains("speech 0"));
        assert!(context.contains("speech 9"));
    }

    #[tokio::test]
    async fn test_query_orders_by_rerank_score() {
        let store = seeded_store(10, 0).await;
        let settings = RetrievalSettings {
            speech_targets: 3,
            ..Default::default()
        };
        let retriever = retriever(store, settings);

        let context = retriever
            .retrieve(&Plan::Query, "q", &metadata(500.0))
            .await
            .unwrap();

        // NumberReranker scores "speech N" as N, so the top three are 9, 8, 7
        // in descending order.
        let section = context.split("Relevant Speech:").nth(1).unwrap();
        let p9 = section.find("speech 9").unwrap();
        let p8 = section.find("speech 8").unwrap();
        let p7 = section.find("speech 7").unwrap();
        assert!(p9 < p8 && p8 < p7);
        assert!(!section.contains("speech 6"));
    }

    #[tokio::test]
    async fn test_query_on_empty_video() {
        let store = Arc::new(MemorySegmentStore::new());
        let retriever = retriever(store, RetrievalSettings::default());

        let context = retriever
            .retrieve(&Plan::Query, "q", &metadata(100.0))
            .await
            .unwrap();
        // Only the metadata block survives.
        assert!(context.starts_with("Video Information of talk.mp4:"));
        assert!(!context.contains("Relevant Speech:"));
    }
}
