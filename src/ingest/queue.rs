//! FIFO ingestion queue with a single background worker.
//!
//! Tasks are processed strictly in submission order, one at a time; model
//! inference is the bottleneck, so concurrent ingestion would only thrash.
//! The worker is spawned lazily on the first enqueue and exits when the
//! queue drains. A failed task is marked Failed and the worker moves on.

use super::{IngestionPipeline, IngestionTask, TaskStatus};
use crate::error::Result;
use crate::metadata_store::MetadataStore;
use crate::segment_store::SegmentStore;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{error, info, instrument};

// Progress milestones recorded after each pipeline stage.
const PROGRESS_PROBED: u8 = 5;
const PROGRESS_SAMPLED: u8 = 15;
const PROGRESS_TRANSCRIBED: u8 = 50;
const PROGRESS_CAPTIONED: u8 = 80;
const PROGRESS_DONE: u8 = 100;

struct QueueState {
    tasks: VecDeque<IngestionTask>,
    worker_running: bool,
}

/// Serializes ingestion through one background worker.
pub struct IngestionQueue {
    pipeline: Arc<dyn IngestionPipeline>,
    segments: Arc<dyn SegmentStore>,
    metadata: Arc<MetadataStore>,
    state: Mutex<QueueState>,
}

impl IngestionQueue {
    /// Create a new queue.
    pub fn new(
        pipeline: Arc<dyn IngestionPipeline>,
        segments: Arc<dyn SegmentStore>,
        metadata: Arc<MetadataStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            segments,
            metadata,
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                worker_running: false,
            }),
        })
    }

    /// Submit a task. Returns immediately; progress is observable through
    /// the metadata store under the task's video id.
    #[instrument(skip(self), fields(video_id = %task.video_id))]
    pub fn enqueue(self: &Arc<Self>, task: IngestionTask) -> Result<()> {
        self.record(&task, TaskStatus::Pending, 0)?;

        let spawn_worker = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.tasks.push_back(task);
            if state.worker_running {
                false
            } else {
                state.worker_running = true;
                true
            }
        };

        if spawn_worker {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                queue.run_worker().await;
            });
        }

        Ok(())
    }

    /// Number of tasks waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tasks.len()
    }

    async fn run_worker(self: Arc<Self>) {
        loop {
            let task = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                match state.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        state.worker_running = false;
                        return;
                    }
                }
            };

            if let Err(e) = self.process(&task).await {
                error!(video_id = %task.video_id, "Ingestion failed: {}", e);
                if let Err(e) = self.record(&task, TaskStatus::Failed, 0) {
                    error!(video_id = %task.video_id, "Failed to record task failure: {}", e);
                }
            }
        }
    }

    async fn process(&self, task: &IngestionTask) -> Result<()> {
        info!(video_id = %task.video_id, "Processing ingestion task");
        self.record(task, TaskStatus::Processing, 0)?;

        let metadata = self.pipeline.probe(task).await?;
        self.metadata.upsert(&metadata)?;
        self.record(task, TaskStatus::Processing, PROGRESS_PROBED)?;

        let frames = self.pipeline.sample_frames(task).await?;
        self.record(task, TaskStatus::Processing, PROGRESS_SAMPLED)?;

        let mut segments = self.pipeline.transcribe(task).await?;
        self.record(task, TaskStatus::Processing, PROGRESS_TRANSCRIBED)?;

        let visual = self.pipeline.caption(task).await?;
        self.record(task, TaskStatus::Processing, PROGRESS_CAPTIONED)?;

        segments.extend(visual);
        let indexed = self.segments.upsert_batch(&segments).await?;

        // Retrieval handles hold their own index connections; force them to
        // observe the new segments.
        self.segments.refresh().await?;

        self.record(task, TaskStatus::Processed, PROGRESS_DONE)?;
        info!(
            video_id = %task.video_id,
            frames, indexed, "Ingestion complete"
        );
        Ok(())
    }

    fn record(&self, task: &IngestionTask, status: TaskStatus, progress: u8) -> Result<()> {
        self.metadata.update_task_status(
            &task.video_id,
            &task.video_path,
            &task.task_id,
            status,
            progress,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkueError;
    use crate::metadata_store::VideoMetadata;
    use crate::segment_store::{MemorySegmentStore, Modality, Segment};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakePipeline {
        fail_video: Option<String>,
        in_flight: Mutex<Option<String>>,
        completed: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl FakePipeline {
        fn new(fail_video: Option<&str>) -> Self {
            Self {
                fail_video: fail_video.map(|s| s.to_string()),
                in_flight: Mutex::new(None),
                completed: Mutex::new(Vec::new()),
                delay: Duration::from_millis(5),
            }
        }

        fn enter(&self, video_id: &str) {
            let mut guard = self.in_flight.lock().unwrap();
            assert!(guard.is_none(), "two tasks processing at once");
            *guard = Some(video_id.to_string());
        }

        fn leave(&self, video_id: &str) {
            let mut guard = self.in_flight.lock().unwrap();
            assert_eq!(guard.as_deref(), Some(video_id));
            *guard = None;
        }
    }

    #[async_trait]
    impl IngestionPipeline for FakePipeline {
        async fn probe(&self, task: &IngestionTask) -> Result<VideoMetadata> {
            self.enter(&task.video_id);
            tokio::time::sleep(self.delay).await;
            if self.fail_video.as_deref() == Some(&task.video_id) {
                self.leave(&task.video_id);
                return Err(SkueError::Ingestion("probe failed".to_string()));
            }
            Ok(VideoMetadata {
                video_id: task.video_id.clone(),
                video_path: task.video_path.clone(),
                duration_secs: 120.0,
                width: 1280,
                height: 720,
                codec: "h264".to_string(),
                fps: 30.0,
                thumbnail_ref: None,
            })
        }

        async fn sample_frames(&self, _task: &IngestionTask) -> Result<usize> {
            Ok(12)
        }

        async fn transcribe(&self, task: &IngestionTask) -> Result<Vec<Segment>> {
            Ok(vec![Segment::new(
                task.video_id.clone(),
                Modality::Speech,
                0.0,
                5.0,
                "hello".to_string(),
                vec![1.0, 0.0],
                0,
            )])
        }

        async fn caption(&self, task: &IngestionTask) -> Result<Vec<Segment>> {
            self.leave(&task.video_id);
            let mut guard = self.completed.lock().unwrap();
            guard.push(task.video_id.clone());
            Ok(vec![Segment::new(
                task.video_id.clone(),
                Modality::Visual,
                0.0,
                1.0,
                "a desk".to_string(),
                vec![0.0, 1.0],
                0,
            )])
        }
    }

    async fn wait_terminal(metadata: &MetadataStore, video_id: &str) -> TaskStatus {
        for _ in 0..500 {
            if let Some(task) = metadata.get_task(video_id).unwrap() {
                if task.status.is_terminal() {
                    return task.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task never reached a terminal state");
    }

    #[tokio::test]
    async fn test_fifo_completion_order() {
        let pipeline = Arc::new(FakePipeline::new(None));
        let segments = Arc::new(MemorySegmentStore::new());
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let queue = IngestionQueue::new(pipeline.clone(), segments.clone(), metadata.clone());

        for name in ["a.mp4", "b.mp4", "c.mp4"] {
            queue
                .enqueue(IngestionTask::new(&format!("/v/{}", name), 1.0))
                .unwrap();
        }

        for name in ["a.mp4", "b.mp4", "c.mp4"] {
            assert_eq!(wait_terminal(&metadata, name).await, TaskStatus::Processed);
        }

        let completed = pipeline.completed.lock().unwrap().clone();
        assert_eq!(completed, vec!["a.mp4", "b.mp4", "c.mp4"]);

        // Both modalities landed in the index.
        assert_eq!(segments.count("a.mp4", Modality::Speech).await.unwrap(), 1);
        assert_eq!(segments.count("a.mp4", Modality::Visual).await.unwrap(), 1);

        let task = metadata.get_task("a.mp4").unwrap().unwrap();
        assert_eq!(task.progress, 100);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_queue() {
        let pipeline = Arc::new(FakePipeline::new(Some("bad.mp4")));
        let segments = Arc::new(MemorySegmentStore::new());
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let queue = IngestionQueue::new(pipeline, segments.clone(), metadata.clone());

        queue.enqueue(IngestionTask::new("/v/bad.mp4", 1.0)).unwrap();
        queue.enqueue(IngestionTask::new("/v/good.mp4", 1.0)).unwrap();

        assert_eq!(wait_terminal(&metadata, "bad.mp4").await, TaskStatus::Failed);
        assert_eq!(
            wait_terminal(&metadata, "good.mp4").await,
            TaskStatus::Processed
        );

        let bad = metadata.get_task("bad.mp4").unwrap().unwrap();
        assert_eq!(bad.progress, 0);
        assert_eq!(
            segments.count("bad.mp4", Modality::Speech).await.unwrap(),
            0
        );
    }

    struct RefreshCountingStore {
        inner: MemorySegmentStore,
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl SegmentStore for RefreshCountingStore {
        async fn get_all(&self, video_id: &str, modality: Modality) -> Result<Vec<Segment>> {
            self.inner.get_all(video_id, modality).await
        }

        async fn get_window(
            &self,
            video_id: &str,
            modality: Modality,
            start: f64,
            end: f64,
        ) -> Result<Vec<Segment>> {
            self.inner.get_window(video_id, modality, start, end).await
        }

        async fn query_nearest(
            &self,
            video_id: &str,
            modality: Modality,
            query_embedding: &[f32],
            k: usize,
        ) -> Result<Vec<crate::segment_store::ScoredSegment>> {
            self.inner
                .query_nearest(video_id, modality, query_embedding, k)
                .await
        }

        async fn upsert_batch(&self, segments: &[Segment]) -> Result<usize> {
            self.inner.upsert_batch(segments).await
        }

        async fn delete_by_video(&self, video_id: &str) -> Result<usize> {
            self.inner.delete_by_video(video_id).await
        }

        async fn count(&self, video_id: &str, modality: Modality) -> Result<usize> {
            self.inner.count(video_id, modality).await
        }

        async fn refresh(&self) -> Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_refresh_after_each_success() {
        let pipeline = Arc::new(FakePipeline::new(None));
        let segments = Arc::new(RefreshCountingStore {
            inner: MemorySegmentStore::new(),
            refreshes: AtomicUsize::new(0),
        });
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let queue = IngestionQueue::new(pipeline, segments.clone(), metadata.clone());

        queue.enqueue(IngestionTask::new("/v/a.mp4", 1.0)).unwrap();
        queue.enqueue(IngestionTask::new("/v/b.mp4", 1.0)).unwrap();

        wait_terminal(&metadata, "a.mp4").await;
        wait_terminal(&metadata, "b.mp4").await;

        assert_eq!(segments.refreshes.load(Ordering::SeqCst), 2);
    }
}
