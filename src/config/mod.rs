//! Configuration module for Skue.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ModePrompts, Prompts, TaskPrompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, IngestionSettings, LlmSettings, PlannerSettings,
    PromptSettings, RerankerSettings, RetrievalSettings, Settings, StoreSettings,
};
