//! HTTP cross-encoder reranker client.

use super::Reranker;
use crate::error::{Result, SkueError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Client for a cross-encoder rerank service (e.g. a hosted bge-reranker).
pub struct HttpReranker {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

impl HttpReranker {
    /// Create a new reranker client.
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    #[instrument(skip(self, query, texts), fields(count = texts.len()))]
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = RerankRequest {
            model: &self.model,
            query,
            texts,
        };

        let response = self
            .http
            .post(format!("{}/rerank", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SkueError::Rerank(format!("Rerank request failed: {}", e)))?;

        let parsed: RerankResponse = response.json().await?;

        if parsed.scores.len() != texts.len() {
            return Err(SkueError::Rerank(format!(
                "Expected {} scores, got {}",
                texts.len(),
                parsed.scores.len()
            )));
        }

        debug!("Reranked {} candidates", texts.len());
        Ok(parsed.scores)
    }
}
