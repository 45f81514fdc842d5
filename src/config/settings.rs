//! Configuration settings for Skue.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub reranker: RerankerSettings,
    pub retrieval: RetrievalSettings,
    pub planner: PlannerSettings,
    pub ingestion: IngestionSettings,
    pub store: StoreSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.skue".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Language model client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of the Ollama-compatible chat endpoint.
    pub base_url: String,
    /// Default model for answer generation.
    pub answer_model: String,
    /// Small model for planning, summaries and titles.
    pub planner_model: String,
    /// Enable thinking-token streaming by default.
    pub think: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            answer_model: "qwen3:8b".to_string(),
            planner_model: "qwen3:0.6b".to_string(),
            think: false,
        }
    }
}

/// Query embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Model for embedding queries into the speech-transcript space.
    pub speech_model: String,
    /// Model for embedding queries into the visual-caption space.
    pub visual_model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            speech_model: "text-embedding-3-small".to_string(),
            visual_model: "text-embedding-3-small".to_string(),
            dimensions: 512,
        }
    }
}

/// Cross-encoder reranker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerSettings {
    /// Base URL of the rerank service.
    pub base_url: String,
    /// Reranker model name passed through to the service.
    pub model: String,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            model: "BAAI/bge-reranker-base".to_string(),
        }
    }
}

/// Retrieval tuning parameters.
///
/// The target counts are tuning knobs, not load-bearing constants; they bound
/// prompt size while preserving topic coverage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Representative speech segments kept per video.
    pub speech_targets: usize,
    /// Representative visual segments kept per video.
    pub visual_targets: usize,
    /// Nearest-neighbor candidates fetched before reranking in query mode.
    pub query_candidates: usize,
    /// Seconds of padding applied around a requested timestamp window.
    pub window_margin_secs: f64,
    /// Apply maximal marginal relevance before reranking in query mode.
    pub use_mmr: bool,
    /// MMR relevance/diversity trade-off.
    pub mmr_lambda: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            speech_targets: 45,
            visual_targets: 15,
            query_candidates: 100,
            window_margin_secs: 30.0,
            use_mmr: false,
            mmr_lambda: 0.7,
        }
    }
}

/// Mode planner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Maximum planning attempts before failing open to summary mode.
    pub max_retries: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self { max_retries: 10 }
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    /// Base URL of the ingestion sidecar (sampling, transcription, embedding).
    pub service_url: String,
    /// Default frame sampling interval in seconds.
    pub sample_interval_secs: f64,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8082".to_string(),
            sample_interval_secs: 1.0,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the segment SQLite database.
    pub segments_path: String,
    /// Path to the chat history SQLite database.
    pub chats_path: String,
    /// Path to the video metadata SQLite database.
    pub metadata_path: String,
    /// Messages of history handed to the LLM per question.
    pub history_window: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            segments_path: "~/.skue/segments.db".to_string(),
            chats_path: "~/.skue/chats.db".to_string(),
            metadata_path: "~/.skue/metadata.db".to_string(),
            history_window: 15,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SkueError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skue")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded segment database path.
    pub fn segments_path(&self) -> PathBuf {
        Self::expand_path(&self.store.segments_path)
    }

    /// Get the expanded chat database path.
    pub fn chats_path(&self) -> PathBuf {
        Self::expand_path(&self.store.chats_path)
    }

    /// Get the expanded metadata database path.
    pub fn metadata_path(&self) -> PathBuf {
        Self::expand_path(&self.store.metadata_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.retrieval.speech_targets, 45);
        assert_eq!(settings.retrieval.visual_targets, 15);
        assert_eq!(settings.retrieval.query_candidates, 100);
        assert_eq!(settings.planner.max_retries, 10);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let settings: Settings =
            toml::from_str("[retrieval]\nspeech_targets = 12\n").expect("parse");
        assert_eq!(settings.retrieval.speech_targets, 12);
        // Untouched sections keep their defaults.
        assert_eq!(settings.retrieval.visual_targets, 15);
        assert_eq!(settings.store.history_window, 15);
    }
}
