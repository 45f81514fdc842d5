//! Videos command implementation.

use super::build_engine;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the videos command.
pub async fn run_videos(settings: Settings) -> Result<()> {
    let engine = build_engine(&settings)?;

    let rows = engine.metadata.list()?;
    if rows.is_empty() {
        Output::info("No videos ingested yet. Use 'skue ingest <path>' to add one.");
        return Ok(());
    }

    Output::header(&format!("Ingested Videos ({})", rows.len()));
    println!();
    for (metadata, task) in &rows {
        let (status, progress) = task
            .as_ref()
            .map(|t| (t.status.as_str(), t.progress))
            .unwrap_or(("Unknown", 0));
        Output::video_info(&metadata.video_id, metadata.duration_secs, status, progress);
    }

    Ok(())
}
