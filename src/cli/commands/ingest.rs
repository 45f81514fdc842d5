//! Ingest command implementation.

use super::build_engine;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SkueError;
use crate::ingest::{IngestionQueue, IngestionTask, SidecarPipeline, TaskStatus};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Run the ingest command. Submits every input to the queue and waits for
/// all of them to finish, showing milestone progress.
pub async fn run_ingest(
    inputs: Vec<String>,
    interval: Option<f64>,
    settings: Settings,
) -> Result<()> {
    if inputs.is_empty() {
        Output::error("No inputs given.");
        return Err(SkueError::InvalidInput("no inputs".to_string()).into());
    }

    if let Err(e) = preflight::check(Operation::Ingest) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    for input in &inputs {
        if !Path::new(input).exists() {
            Output::error(&format!("File not found: {}", input));
            return Err(SkueError::InvalidInput(format!("file not found: {}", input)).into());
        }
    }

    let engine = build_engine(&settings)?;
    let pipeline = Arc::new(SidecarPipeline::new(&settings.ingestion.service_url));
    let queue = IngestionQueue::new(pipeline, Arc::clone(&engine.segments), Arc::clone(&engine.metadata));

    let interval = interval.unwrap_or(settings.ingestion.sample_interval_secs);
    let mut video_ids = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let task = IngestionTask::new(input, interval);
        video_ids.push(task.video_id.clone());
        queue.enqueue(task)?;
    }
    Output::info(&format!("Queued {} video(s) for ingestion.", video_ids.len()));

    let mut failures = 0;
    for video_id in &video_ids {
        let bar = Output::progress_bar(100, video_id);
        loop {
            let task = engine.metadata.get_task(video_id)?;
            if let Some(task) = task {
                bar.set_position(task.progress as u64);
                if task.status.is_terminal() {
                    bar.finish_and_clear();
                    match task.status {
                        TaskStatus::Processed => {
                            Output::success(&format!("Ingested {}", video_id));
                        }
                        _ => {
                            failures += 1;
                            Output::error(&format!("Failed to ingest {}", video_id));
                        }
                    }
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
    }

    if failures > 0 {
        return Err(SkueError::Ingestion(format!("{} video(s) failed", failures)).into());
    }
    Ok(())
}
