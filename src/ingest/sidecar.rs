//! Ingestion pipeline backed by a sidecar extraction service.
//!
//! The sidecar owns the GPU-heavy work (ffprobe, whisper, captioning,
//! embedding) and exposes one endpoint per stage. Requests carry the video
//! path; the service and this process share a filesystem.

use super::{IngestionPipeline, IngestionTask};
use crate::error::{Result, SkueError};
use crate::metadata_store::VideoMetadata;
use crate::segment_store::{Modality, Segment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Client for the extraction sidecar.
pub struct SidecarPipeline {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct StageRequest<'a> {
    video_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_interval_secs: Option<f64>,
}

#[derive(Deserialize)]
struct ProbeResponse {
    duration_secs: f64,
    width: u32,
    height: u32,
    codec: String,
    fps: f64,
    #[serde(default)]
    thumbnail_ref: Option<String>,
}

#[derive(Deserialize)]
struct FramesResponse {
    frame_count: usize,
}

#[derive(Deserialize)]
struct SegmentsResponse {
    segments: Vec<RawSegment>,
}

#[derive(Deserialize)]
struct RawSegment {
    start_secs: f64,
    end_secs: f64,
    text: String,
    embedding: Vec<f32>,
}

impl SidecarPipeline {
    /// Create a new pipeline client.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &StageRequest<'_>,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, endpoint))
            .json(request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SkueError::Ingestion(format!("{} stage failed: {}", endpoint, e)))?;

        Ok(response.json().await?)
    }

    async fn fetch_segments(
        &self,
        endpoint: &str,
        task: &IngestionTask,
        modality: Modality,
        interval: Option<f64>,
    ) -> Result<Vec<Segment>> {
        let response: SegmentsResponse = self
            .post(
                endpoint,
                &StageRequest {
                    video_path: &task.video_path,
                    sample_interval_secs: interval,
                },
            )
            .await?;

        let segments = response
            .segments
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                Segment::new(
                    task.video_id.clone(),
                    modality,
                    raw.start_secs,
                    raw.end_secs,
                    raw.text,
                    raw.embedding,
                    i as i64,
                )
            })
            .collect::<Vec<_>>();

        debug!(
            video_id = %task.video_id,
            modality = %modality,
            count = segments.len(),
            "Fetched segments from sidecar"
        );
        Ok(segments)
    }
}

#[async_trait]
impl IngestionPipeline for SidecarPipeline {
    #[instrument(skip(self, task), fields(video_id = %task.video_id))]
    async fn probe(&self, task: &IngestionTask) -> Result<VideoMetadata> {
        let probe: ProbeResponse = self
            .post(
                "probe",
                &StageRequest {
                    video_path: &task.video_path,
                    sample_interval_secs: None,
                },
            )
            .await?;

        Ok(VideoMetadata {
            video_id: task.video_id.clone(),
            video_path: task.video_path.clone(),
            duration_secs: probe.duration_secs,
            width: probe.width,
            height: probe.height,
            codec: probe.codec,
            fps: probe.fps,
            thumbnail_ref: probe.thumbnail_ref,
        })
    }

    #[instrument(skip(self, task), fields(video_id = %task.video_id))]
    async fn sample_frames(&self, task: &IngestionTask) -> Result<usize> {
        let frames: FramesResponse = self
            .post(
                "frames",
                &StageRequest {
                    video_path: &task.video_path,
                    sample_interval_secs: Some(task.sample_interval_secs),
                },
            )
            .await?;
        Ok(frames.frame_count)
    }

    #[instrument(skip(self, task), fields(video_id = %task.video_id))]
    async fn transcribe(&self, task: &IngestionTask) -> Result<Vec<Segment>> {
        self.fetch_segments("transcribe", task, Modality::Speech, None)
            .await
    }

    #[instrument(skip(self, task), fields(video_id = %task.video_id))]
    async fn caption(&self, task: &IngestionTask) -> Result<Vec<Segment>> {
        self.fetch_segments(
            "caption",
            task,
            Modality::Visual,
            Some(task.sample_interval_secs),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_response_parsing() {
        let body = r#"{"segments":[{"start_secs":0.0,"end_secs":4.2,"text":"hello there","embedding":[0.1,0.2]}]}"#;
        let parsed: SegmentsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].text, "hello there");
        assert_eq!(parsed.segments[0].embedding.len(), 2);
    }

    #[test]
    fn test_probe_response_parsing() {
        let body =
            r#"{"duration_secs":630.5,"width":1920,"height":1080,"codec":"h264","fps":29.97}"#;
        let parsed: ProbeResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.width, 1920);
        assert!(parsed.thumbnail_ref.is_none());
    }
}
