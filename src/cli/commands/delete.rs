//! Delete command implementation.

use super::build_engine;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the delete command. Removes the video's segments from the index and
/// its metadata row.
pub async fn run_delete(video_id: &str, settings: Settings) -> Result<()> {
    let engine = build_engine(&settings)?;

    let removed = engine.segments.delete_by_video(video_id).await?;
    let metadata = engine.metadata.delete(video_id)?;

    Output::success(&format!(
        "Deleted {} ({} segments removed).",
        metadata.video_id, removed
    ));
    Ok(())
}
