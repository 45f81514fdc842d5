//! Query embedding and reranking seams.
//!
//! The segment embeddings themselves are produced at ingestion time by
//! external models; the retrieval path only needs to embed a question into
//! the matching modality space and to score (text, question) pairs.

mod openai;
mod reranker;

pub use openai::OpenAIQueryEmbedder;
pub use reranker::HttpReranker;

use crate::error::Result;
use crate::segment_store::Modality;
use async_trait::async_trait;

/// Trait for embedding questions into a modality's vector space.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// Embed a query string into the space used by the given modality.
    async fn embed_query(&self, text: &str, modality: Modality) -> Result<Vec<f32>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Trait for cross-encoder relevance scoring.
///
/// Embedding distance is a coarse filter; this is the precision step that
/// jointly encodes each (text, query) pair.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score each candidate text against the query. Returns one score per
    /// input text, higher is more relevant.
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}
