//! Language model client abstraction.
//!
//! The engine only needs two operations from a model backend: a blocking
//! completion (planning, summaries, titles) and a streaming chat that can
//! interleave thinking and content tokens.

mod ollama;

pub use ollama::OllamaClient;

use crate::chat_store::Role;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// A message handed to the model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Base64-encoded images attached to the message, if any.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Attach base64-encoded images.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// One streamed generation step from the model.
#[derive(Debug, Clone, Default)]
pub struct ChatDelta {
    /// Answer tokens in this step.
    pub content: String,
    /// Reasoning tokens in this step.
    pub thinking: String,
    /// Set on the final step.
    pub done: bool,
}

/// A typed chunk delivered to the caller of an answer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerChunk {
    Thinking(String),
    Content(String),
    Done,
}

/// The caller-facing answer stream: a lazy, finite sequence of typed chunks
/// consumed by exactly one reader. Backpressure comes from the bounded
/// channel; the transport owns pacing beyond that.
pub type AnswerStream = tokio::sync::mpsc::Receiver<Result<AnswerChunk>>;

/// Raw model delta stream, as produced by a backend client.
pub type ChatDeltaStream = BoxStream<'static, Result<ChatDelta>>;

/// Trait for language model backends.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run a non-streaming completion and return the full response text.
    async fn generate(&self, messages: &[ChatMessage], model: &str, think: bool)
        -> Result<String>;

    /// Run a streaming chat completion.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
        think: bool,
    ) -> Result<ChatDeltaStream>;
}
