//! OpenAI-compatible query embedder.

use super::QueryEmbedder;
use crate::error::{Result, SkueError};
use crate::segment_store::Modality;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Query embedder backed by an OpenAI-compatible embeddings API.
///
/// Speech transcripts and visual captions may live in different embedding
/// spaces, so the model is selected per modality.
pub struct OpenAIQueryEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    speech_model: String,
    visual_model: String,
    dimensions: usize,
}

impl OpenAIQueryEmbedder {
    /// Create a new embedder with per-modality models.
    pub fn with_config(speech_model: &str, visual_model: &str, dimensions: usize) -> Self {
        Self {
            client: async_openai::Client::new(),
            speech_model: speech_model.to_string(),
            visual_model: visual_model.to_string(),
            dimensions,
        }
    }

    fn model_for(&self, modality: Modality) -> &str {
        match modality {
            Modality::Speech => &self.speech_model,
            Modality::Visual => &self.visual_model,
        }
    }
}

#[async_trait]
impl QueryEmbedder for OpenAIQueryEmbedder {
    #[instrument(skip(self, text), fields(modality = %modality))]
    async fn embed_query(&self, text: &str, modality: Modality) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model_for(modality))
            .input(EmbeddingInput::String(text.to_string()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| SkueError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| SkueError::Embedding(format!("Embedding API error: {}", e)))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| SkueError::Embedding("Empty embedding response".to_string()))?;

        debug!("Embedded query into {} dims", embedding.len());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_selection() {
        let embedder = OpenAIQueryEmbedder::with_config("asr-embed", "clip-embed", 512);
        assert_eq!(embedder.model_for(Modality::Speech), "asr-embed");
        assert_eq!(embedder.model_for(Modality::Visual), "clip-embed");
        assert_eq!(embedder.dimensions(), 512);
    }
}
