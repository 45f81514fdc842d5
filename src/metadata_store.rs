//! Video metadata and ingestion task status persistence.
//!
//! One row per ingested video, carrying probe metadata (duration, geometry,
//! codec) plus the task columns mutated by the ingestion queue.

use crate::error::{Result, SkueError};
use crate::ingest::TaskStatus;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS video_metadata (
    video_id TEXT PRIMARY KEY,
    video_path TEXT NOT NULL,
    duration_secs REAL NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    codec TEXT NOT NULL,
    fps REAL NOT NULL,
    thumbnail_ref TEXT,
    task_id TEXT,
    task_status TEXT,
    task_progress INTEGER,
    created_at TEXT NOT NULL
);
"#;

/// Probe metadata for one ingested video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Stable identifier (the video filename).
    pub video_id: String,
    /// Source path on disk.
    pub video_path: String,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Codec name (e.g. "h264").
    pub codec: String,
    /// Frames per second.
    pub fps: f64,
    /// Reference to a thumbnail image, if one was extracted.
    pub thumbnail_ref: Option<String>,
}

impl VideoMetadata {
    /// Render the metadata block embedded in planning and context prompts.
    pub fn prompt_context(&self) -> String {
        format!(
            "Video Information of {}:\n- Duration: {} seconds\n- Resolution: {}x{}\n- FPS: {}",
            self.video_id, self.duration_secs, self.width, self.height, self.fps
        )
    }
}

/// Task columns for one video row.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
}

/// SQLite-backed metadata store.
pub struct MetadataStore {
    conn: Mutex<Connection>,
}

impl MetadataStore {
    /// Create a new metadata store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized metadata store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory metadata store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SkueError::Metadata(format!("Failed to acquire lock: {}", e)))
    }

    /// Insert or update a video's metadata row. Task columns are left
    /// untouched, so progress written by the queue survives a probe-time
    /// upsert on the same row.
    pub fn upsert(&self, metadata: &VideoMetadata) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO video_metadata
             (video_id, video_path, duration_secs, width, height, codec, fps, thumbnail_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(video_id) DO UPDATE SET
                 video_path = excluded.video_path,
                 duration_secs = excluded.duration_secs,
                 width = excluded.width,
                 height = excluded.height,
                 codec = excluded.codec,
                 fps = excluded.fps,
                 thumbnail_ref = excluded.thumbnail_ref",
            params![
                metadata.video_id,
                metadata.video_path,
                metadata.duration_secs,
                metadata.width,
                metadata.height,
                metadata.codec,
                metadata.fps,
                metadata.thumbnail_ref,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a video's metadata.
    pub fn get(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT video_id, video_path, duration_secs, width, height, codec, fps, thumbnail_ref
                 FROM video_metadata WHERE video_id = ?1",
                params![video_id],
                |row| {
                    Ok(VideoMetadata {
                        video_id: row.get(0)?,
                        video_path: row.get(1)?,
                        duration_secs: row.get(2)?,
                        width: row.get(3)?,
                        height: row.get(4)?,
                        codec: row.get(5)?,
                        fps: row.get(6)?,
                        thumbnail_ref: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// List all ingested videos, newest first.
    pub fn list(&self) -> Result<Vec<(VideoMetadata, Option<TaskRecord>)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, video_path, duration_secs, width, height, codec, fps, thumbnail_ref,
                    task_id, task_status, task_progress
             FROM video_metadata ORDER BY created_at DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let metadata = VideoMetadata {
                    video_id: row.get(0)?,
                    video_path: row.get(1)?,
                    duration_secs: row.get(2)?,
                    width: row.get(3)?,
                    height: row.get(4)?,
                    codec: row.get(5)?,
                    fps: row.get(6)?,
                    thumbnail_ref: row.get(7)?,
                };
                let task_id: Option<String> = row.get(8)?;
                let status: Option<String> = row.get(9)?;
                let progress: Option<i64> = row.get(10)?;
                let task = match (task_id, status) {
                    (Some(task_id), Some(status)) => Some(TaskRecord {
                        task_id,
                        status: TaskStatus::from_str(&status).unwrap_or(TaskStatus::Pending),
                        progress: progress.unwrap_or(0).clamp(0, 100) as u8,
                    }),
                    _ => None,
                };
                Ok((metadata, task))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Update the task columns for a video. The row may not exist yet while
    /// ingestion is still probing; in that case a placeholder row is created
    /// so progress is visible before metadata extraction completes.
    pub fn update_task_status(
        &self,
        video_id: &str,
        video_path: &str,
        task_id: &str,
        status: TaskStatus,
        progress: u8,
    ) -> Result<()> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE video_metadata SET task_id = ?1, task_status = ?2, task_progress = ?3
             WHERE video_id = ?4",
            params![task_id, status.as_str(), progress as i64, video_id],
        )?;

        if updated == 0 {
            conn.execute(
                "INSERT INTO video_metadata
                 (video_id, video_path, duration_secs, width, height, codec, fps, thumbnail_ref,
                  task_id, task_status, task_progress, created_at)
                 VALUES (?1, ?2, 0, 0, 0, '', 0, NULL, ?3, ?4, ?5, ?6)",
                params![
                    video_id,
                    video_path,
                    task_id,
                    status.as_str(),
                    progress as i64,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        Ok(())
    }

    /// Get the task columns for a video.
    pub fn get_task(&self, video_id: &str) -> Result<Option<TaskRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT task_id, task_status, task_progress FROM video_metadata WHERE video_id = ?1",
                params![video_id],
                |row| {
                    let task_id: Option<String> = row.get(0)?;
                    let status: Option<String> = row.get(1)?;
                    let progress: Option<i64> = row.get(2)?;
                    Ok((task_id, status, progress))
                },
            )
            .optional()?;

        Ok(row.and_then(|(task_id, status, progress)| {
            match (task_id, status) {
                (Some(task_id), Some(status)) => Some(TaskRecord {
                    task_id,
                    status: TaskStatus::from_str(&status).unwrap_or(TaskStatus::Pending),
                    progress: progress.unwrap_or(0).clamp(0, 100) as u8,
                }),
                _ => None,
            }
        }))
    }

    /// Delete a video's metadata row. Returns the deleted metadata.
    pub fn delete(&self, video_id: &str) -> Result<VideoMetadata> {
        let metadata = self
            .get(video_id)?
            .ok_or_else(|| SkueError::VideoNotFound(video_id.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM video_metadata WHERE video_id = ?1",
            params![video_id],
        )?;

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(video_id: &str) -> VideoMetadata {
        VideoMetadata {
            video_id: video_id.to_string(),
            video_path: format!("/videos/{}", video_id),
            duration_secs: 630.0,
            width: 1920,
            height: 1080,
            codec: "h264".to_string(),
            fps: 29.97,
            thumbnail_ref: Some(format!("/thumbnails/{}.jpg", video_id)),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let store = MetadataStore::in_memory().unwrap();
        store.upsert(&sample("talk.mp4")).unwrap();

        let found = store.get("talk.mp4").unwrap().unwrap();
        assert_eq!(found.duration_secs, 630.0);
        assert_eq!(found.width, 1920);
        assert!(store.get("missing.mp4").unwrap().is_none());
    }

    #[test]
    fn test_prompt_context() {
        let context = sample("talk.mp4").prompt_context();
        assert!(context.starts_with("Video Information of talk.mp4:"));
        assert!(context.contains("- Duration: 630 seconds"));
        assert!(context.contains("- Resolution: 1920x1080"));
    }

    #[test]
    fn test_task_status_before_metadata() {
        let store = MetadataStore::in_memory().unwrap();

        // Queue reports Processing before the probe has stored metadata.
        store
            .update_task_status("talk.mp4", "/videos/talk.mp4", "t1", TaskStatus::Processing, 0)
            .unwrap();
        let task = store.get_task("talk.mp4").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.progress, 0);

        store
            .update_task_status("talk.mp4", "/videos/talk.mp4", "t1", TaskStatus::Processed, 100)
            .unwrap();
        let task = store.get_task("talk.mp4").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processed);
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_upsert_preserves_task_columns() {
        let store = MetadataStore::in_memory().unwrap();

        // The queue writes progress into the placeholder row, then the probe
        // stage upserts the real metadata over it.
        store
            .update_task_status("talk.mp4", "/videos/talk.mp4", "t1", TaskStatus::Processing, 5)
            .unwrap();
        store.upsert(&sample("talk.mp4")).unwrap();

        let task = store.get_task("talk.mp4").unwrap().unwrap();
        assert_eq!(task.task_id, "t1");
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.progress, 5);

        // Metadata columns did update.
        let found = store.get("talk.mp4").unwrap().unwrap();
        assert_eq!(found.duration_secs, 630.0);
        assert_eq!(found.codec, "h264");
    }

    #[test]
    fn test_delete() {
        let store = MetadataStore::in_memory().unwrap();
        store.upsert(&sample("talk.mp4")).unwrap();
        let deleted = store.delete("talk.mp4").unwrap();
        assert_eq!(deleted.video_id, "talk.mp4");
        assert!(store.get("talk.mp4").unwrap().is_none());
        assert!(store.delete("talk.mp4").is_err());
    }
}
