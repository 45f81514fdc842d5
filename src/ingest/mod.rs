//! Video ingestion.
//!
//! Ingestion turns a video file into indexed segments: probe metadata, sample
//! frames, transcribe speech, caption the sampled frames. The heavy model
//! work lives behind [`IngestionPipeline`] so the queue logic stays testable;
//! the default implementation talks to a sidecar service.

mod queue;
mod sidecar;

pub use queue::IngestionQueue;
pub use sidecar::SidecarPipeline;

use crate::error::Result;
use crate::metadata_store::VideoMetadata;
use crate::segment_store::Segment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of an ingestion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Queued, not yet picked up by the worker.
    Pending,
    /// Currently being processed. At most one task is in this state.
    Processing,
    /// Completed and queryable.
    Processed,
    /// Terminated with an error.
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Processing => "Processing",
            TaskStatus::Processed => "Processed",
            TaskStatus::Failed => "Failed",
        }
    }

    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Processed | TaskStatus::Failed)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(TaskStatus::Pending),
            "Processing" => Ok(TaskStatus::Processing),
            "Processed" => Ok(TaskStatus::Processed),
            "Failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One queued ingestion job.
#[derive(Debug, Clone)]
pub struct IngestionTask {
    /// Unique task handle reported alongside progress.
    pub task_id: String,
    /// Video identifier (the filename).
    pub video_id: String,
    /// Source path on disk.
    pub video_path: String,
    /// Frame sampling interval in seconds.
    pub sample_interval_secs: f64,
}

impl IngestionTask {
    /// Create a task for a video path, deriving the video id from the
    /// filename.
    pub fn new(video_path: &str, sample_interval_secs: f64) -> Self {
        let video_id = std::path::Path::new(video_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| video_path.to_string());

        Self {
            task_id: Uuid::new_v4().to_string(),
            video_id,
            video_path: video_path.to_string(),
            sample_interval_secs,
        }
    }
}

/// The staged extraction work for one video.
///
/// The queue drives the stages in order and records a progress milestone
/// after each one, so implementations only do the work.
#[async_trait]
pub trait IngestionPipeline: Send + Sync {
    /// Probe the video file for duration, geometry, codec and fps.
    async fn probe(&self, task: &IngestionTask) -> Result<VideoMetadata>;

    /// Sample frames at the task's interval. Returns the number of frames.
    async fn sample_frames(&self, task: &IngestionTask) -> Result<usize>;

    /// Transcribe the audio track into embedded speech segments.
    async fn transcribe(&self, task: &IngestionTask) -> Result<Vec<Segment>>;

    /// Caption the sampled frames into embedded visual segments.
    async fn caption(&self, task: &IngestionTask) -> Result<Vec<Segment>>;
}
