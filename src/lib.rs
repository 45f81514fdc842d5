//! Skue - Video Question Answering
//!
//! A local-first engine for asking questions about ingested videos, backed by
//! multi-modal retrieval over visual captions and speech transcripts.
//!
//! The name "Skue" comes from the Norwegian word for "behold" or "view."
//!
//! # Overview
//!
//! Skue allows you to:
//! - Ingest videos through a serialized background queue with live progress
//! - Retrieve relevant speech and visual evidence per question
//! - Plan the retrieval mode per question with a small LLM router
//! - Stream AI answers grounded in the retrieved context
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt template management
//! - `segment_store` - Vector index abstraction over time-stamped segments
//! - `metadata_store` - Video metadata and ingestion task status
//! - `chat_store` - Chat sessions and message history
//! - `embedding` - Query embedding and cross-encoder reranking seams
//! - `llm` - Language model client abstraction
//! - `planner` - Execution mode planning and validation
//! - `retrieval` - Context selection strategies and formatting
//! - `orchestrator` - Question answering pipeline coordination
//! - `ingest` - Serialized video ingestion queue
//!
//! # Example
//!
//! ```rust,no_run
//! use skue::config::Settings;
//! use skue::ingest::IngestionTask;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let task = IngestionTask::new("/videos/talk.mp4", settings.ingestion.sample_interval_secs);
//!     // Wire stores, pipeline and queue, then: queue.enqueue(task)?;
//!     Ok(())
//! }
//! ```

pub mod chat_store;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod metadata_store;
pub mod orchestrator;
pub mod planner;
pub mod retrieval;
pub mod segment_store;

pub mod cli;

pub use error::{Result, SkueError};
