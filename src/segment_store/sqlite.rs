//! SQLite-based segment store implementation.
//!
//! Uses SQLite with cosine distance computed in Rust for simplicity.
//! For large libraries consider the sqlite-vec extension or a dedicated
//! vector database.

use super::{cosine_distance, Modality, ScoredSegment, Segment, SegmentStore};
use crate::error::{Result, SkueError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS segments (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL,
    modality TEXT NOT NULL,
    start_secs REAL NOT NULL,
    end_secs REAL NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    sequence INTEGER NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_segments_video_modality
    ON segments(video_id, modality);
"#;

/// SQLite-based segment store.
pub struct SqliteSegmentStore {
    conn: Mutex<Connection>,
    /// Database path; None for in-memory stores, which cannot be reopened.
    path: Option<PathBuf>,
}

impl SqliteSegmentStore {
    /// Create a new SQLite segment store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite segment store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create an in-memory SQLite segment store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SkueError::SegmentStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_segment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Segment> {
        let id: String = row.get(0)?;
        let modality: String = row.get(2)?;
        let embedding: Vec<u8> = row.get(6)?;
        let indexed_at: String = row.get(8)?;

        Ok(Segment {
            id: Uuid::parse_str(&id).unwrap_or_default(),
            video_id: row.get(1)?,
            modality: Modality::from_str(&modality).unwrap_or(Modality::Speech),
            start_secs: row.get(3)?,
            end_secs: row.get(4)?,
            text: row.get(5)?,
            embedding: Self::bytes_to_embedding(&embedding),
            sequence: row.get(7)?,
            indexed_at: indexed_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl SegmentStore for SqliteSegmentStore {
    async fn get_all(&self, video_id: &str, modality: Modality) -> Result<Vec<Segment>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, video_id, modality, start_secs, end_secs, text, embedding, sequence, indexed_at
             FROM segments WHERE video_id = ?1 AND modality = ?2 ORDER BY sequence",
        )?;

        let segments = stmt
            .query_map(params![video_id, modality.as_str()], Self::row_to_segment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(segments)
    }

    async fn get_window(
        &self,
        video_id: &str,
        modality: Modality,
        start: f64,
        end: f64,
    ) -> Result<Vec<Segment>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, video_id, modality, start_secs, end_secs, text, embedding, sequence, indexed_at
             FROM segments
             WHERE video_id = ?1 AND modality = ?2 AND end_secs >= ?3 AND start_secs <= ?4
             ORDER BY sequence",
        )?;

        let segments = stmt
            .query_map(
                params![video_id, modality.as_str(), start, end],
                Self::row_to_segment,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(segments)
    }

    async fn query_nearest(
        &self,
        video_id: &str,
        modality: Modality,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredSegment>> {
        let candidates = self.get_all(video_id, modality).await?;

        let mut scored: Vec<ScoredSegment> = candidates
            .into_iter()
            .map(|segment| ScoredSegment {
                distance: cosine_distance(query_embedding, &segment.embedding),
                segment,
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

    #[instrument(skip(self, segments), fields(count = segments.len()))]
    async fn upsert_batch(&self, segments: &[Segment]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for segment in segments {
            let embedding_bytes = Self::embedding_to_bytes(&segment.embedding);
            tx.execute(
                "INSERT OR REPLACE INTO segments
                 (id, video_id, modality, start_secs, end_secs, text, embedding, sequence, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    segment.id.to_string(),
                    segment.video_id,
                    segment.modality.as_str(),
                    segment.start_secs,
                    segment.end_secs,
                    segment.text,
                    embedding_bytes,
                    segment.sequence,
                    segment.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(segments.len())
    }

    async fn delete_by_video(&self, video_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM segments WHERE video_id = ?1", params![video_id])?;
        Ok(deleted)
    }

    async fn count(&self, video_id: &str, modality: Modality) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM segments WHERE video_id = ?1 AND modality = ?2",
            params![video_id, modality.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn refresh(&self) -> Result<()> {
        // Reopen the connection so queries observe segments written through
        // other connections since this store was constructed.
        let Some(path) = &self.path else {
            return Ok(());
        };

        let fresh = Connection::open(path)?;
        fresh.execute_batch("PRAGMA journal_mode=WAL;")?;

        let mut conn = self.lock()?;
        *conn = fresh;

        info!("Refreshed segment store connection");
        Ok(())
    }
}
