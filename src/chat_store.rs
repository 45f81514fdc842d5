//! Chat session and message persistence.
//!
//! Sessions own an append-only, timestamp-ordered message log. The LLM
//! context window excludes `thinking` messages and is bounded to the most
//! recent exchanges.

use crate::error::{Result, SkueError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_sessions (
    chat_id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_name TEXT,
    created_at TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    FOREIGN KEY (chat_id) REFERENCES chat_sessions(chat_id)
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_chat_id ON chat_messages(chat_id);
"#;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Accumulated reasoning tokens, stored but excluded from LLM context.
    Thinking,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Thinking => "thinking",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "thinking" => Ok(Role::Thinking),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub chat_id: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A chat session summary row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub chat_id: i64,
    pub chat_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// SQLite-backed chat store.
pub struct ChatStore {
    conn: Mutex<Connection>,
}

impl ChatStore {
    /// Create a new chat store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized chat store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory chat store (useful for testing).
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
            .map_err(|e| SkueError::ChatStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Create a session with an explicit id.
    pub fn create_session(&self, chat_id: i64, chat_name: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO chat_sessions (chat_id, chat_name, created_at, last_updated)
             VALUES (?1, ?2, ?3, ?3)",
            params![chat_id, chat_name, now],
        )?;
        Ok(())
    }

    /// The id a newly created session would receive.
    pub fn next_session_id(&self) -> Result<i64> {
        let conn = self.lock()?;
        let max: Option<i64> =
            conn.query_row("SELECT MAX(chat_id) FROM chat_sessions", [], |row| row.get(0))?;
        Ok(max.map_or(1, |m| m + 1))
    }

    /// Append a message and bump the session's last_updated timestamp.
    pub fn add_message(&self, chat_id: i64, role: Role, content: &str) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO chat_messages (chat_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, role.as_str(), content, now],
        )?;
        conn.execute(
            "UPDATE chat_sessions SET last_updated = ?1 WHERE chat_id = ?2",
            params![now, chat_id],
        )?;
        Ok(())
    }

    /// Full message history for a session, oldest first.
    pub fn history(&self, chat_id: i64) -> Result<Vec<StoredMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT chat_id, role, content, timestamp FROM chat_messages
             WHERE chat_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let messages = stmt
            .query_map(params![chat_id], Self::row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// The most recent `limit` non-thinking messages, in chronological order,
    /// as handed to the LLM.
    pub fn messages_for_llm(&self, chat_id: i64, limit: usize) -> Result<Vec<StoredMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT chat_id, role, content, timestamp FROM chat_messages
             WHERE chat_id = ?1 AND id IN (
                 SELECT id FROM chat_messages
                 WHERE chat_id = ?1 AND role != 'thinking'
                 ORDER BY timestamp DESC, id DESC LIMIT ?2
             )
             ORDER BY timestamp ASC, id ASC",
        )?;
        let messages = stmt
            .query_map(params![chat_id, limit as i64], Self::row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// List all sessions, most recently updated first.
    pub fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT chat_id, chat_name, created_at, last_updated FROM chat_sessions
             ORDER BY last_updated DESC",
        )?;
        let sessions = stmt
            .query_map([], |row| {
                let created_at: String = row.get(2)?;
                let last_updated: String = row.get(3)?;
                Ok(ChatSession {
                    chat_id: row.get(0)?,
                    chat_name: row.get(1)?,
                    created_at: parse_utc(&created_at),
                    last_updated: parse_utc(&last_updated),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// Get a session's name.
    pub fn session_name(&self, chat_id: i64) -> Result<Option<String>> {
        let conn = self.lock()?;
        let name: Option<Option<String>> = conn
            .query_row(
                "SELECT chat_name FROM chat_sessions WHERE chat_id = ?1",
                params![chat_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.flatten())
    }

    /// Rename a session.
    pub fn update_session_name(&self, chat_id: i64, new_name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE chat_sessions SET chat_name = ?1 WHERE chat_id = ?2",
            params![new_name, chat_id],
        )?;
        Ok(())
    }

    /// Delete a session's messages, keeping the session row.
    pub fn clear_history(&self, chat_id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM chat_messages WHERE chat_id = ?1", params![chat_id])?;
        Ok(())
    }

    /// Delete a session and its messages.
    pub fn delete_session(&self, chat_id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM chat_messages WHERE chat_id = ?1", params![chat_id])?;
        conn.execute("DELETE FROM chat_sessions WHERE chat_id = ?1", params![chat_id])?;
        Ok(())
    }

    fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
        let role: String = row.get(1)?;
        let timestamp: String = row.get(3)?;
        Ok(StoredMessage {
            chat_id: row.get(0)?,
            role: role.parse().unwrap_or(Role::User),
            content: row.get(2)?,
            timestamp: parse_utc(&timestamp),
        })
    }
}

fn parse_utc(value: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .unwrap_or_else(|_| Utc::now())
}
