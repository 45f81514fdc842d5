//! CLI command implementations.

mod ask;
mod chat;
mod chats;
mod config;
mod delete;
mod ingest;
mod init;
mod videos;

pub use ask::run_ask;
pub use chat::run_chat;
pub use chats::run_chats;
pub use config::run_config;
pub use delete::run_delete;
pub use ingest::run_ingest;
pub use init::run_init;
pub use videos::run_videos;

use crate::chat_store::ChatStore;
use crate::config::{Prompts, Settings};
use crate::embedding::{HttpReranker, OpenAIQueryEmbedder, QueryEmbedder, Reranker};
use crate::error::Result;
use crate::llm::{LanguageModel, OllamaClient};
use crate::metadata_store::MetadataStore;
use crate::orchestrator::{AskStage, ChatOrchestrator, ProgressSink};
use crate::planner::ModePlanner;
use crate::retrieval::ContextRetriever;
use crate::segment_store::{SegmentStore, SqliteSegmentStore};
use std::sync::Arc;

use super::Output;

/// Wired-up engine components shared by the commands.
pub(crate) struct Engine {
    pub segments: Arc<dyn SegmentStore>,
    pub chats: Arc<ChatStore>,
    pub metadata: Arc<MetadataStore>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

/// Assemble the engine from settings.
pub(crate) fn build_engine(settings: &Settings) -> Result<Engine> {
    let segments: Arc<dyn SegmentStore> =
        Arc::new(SqliteSegmentStore::new(&settings.segments_path())?);
    let chats = Arc::new(ChatStore::new(&settings.chats_path())?);
    let metadata = Arc::new(MetadataStore::new(&settings.metadata_path())?);

    let llm: Arc<dyn LanguageModel> = Arc::new(OllamaClient::new(&settings.llm.base_url));
    let embedder: Arc<dyn QueryEmbedder> = Arc::new(OpenAIQueryEmbedder::with_config(
        &settings.embedding.speech_model,
        &settings.embedding.visual_model,
        settings.embedding.dimensions as usize,
    ));
    let reranker: Arc<dyn Reranker> = Arc::new(HttpReranker::new(
        &settings.reranker.base_url,
        &settings.reranker.model,
    ));

    let retriever = Arc::new(ContextRetriever::new(
        Arc::clone(&segments),
        embedder,
        reranker,
        settings.retrieval.clone(),
    ));
    let planner = Arc::new(ModePlanner::new(
        Arc::clone(&llm),
        &settings.llm.planner_model,
        settings.planner.max_retries,
    ));
    let prompts = Arc::new(Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?);

    let orchestrator = Arc::new(ChatOrchestrator::new(
        llm,
        retriever,
        planner,
        Arc::clone(&chats),
        Arc::clone(&metadata),
        prompts,
        settings.llm.clone(),
        settings.store.history_window,
    ));

    Ok(Engine {
        segments,
        chats,
        metadata,
        orchestrator,
    })
}

/// Progress sink that narrates pipeline stages on the terminal.
pub(crate) struct CliProgress;

impl ProgressSink for CliProgress {
    fn stage(&self, stage: AskStage) {
        match stage {
            AskStage::SummarizingHistory { message_count } => {
                Output::info(&format!("Summarizing {} messages of history...", message_count));
            }
            AskStage::SelectingMode => {
                Output::info("Selecting retrieval mode...");
            }
            AskStage::RefiningQuery => {
                Output::info("Refining the search query...");
            }
            AskStage::RetrievingContext {
                video_index,
                video_count,
                video_name,
            } => {
                Output::info(&format!(
                    "Retrieving context from {} ({}/{})...",
                    video_name,
                    video_index + 1,
                    video_count
                ));
            }
            AskStage::SummarizingVideo {
                video_index,
                video_count,
                video_name,
            } => {
                Output::info(&format!(
                    "Summarizing {} ({}/{})...",
                    video_name,
                    video_index + 1,
                    video_count
                ));
            }
            AskStage::LoadingModel { model } => {
                Output::info(&format!("Loading {}...", model));
            }
        }
    }
}
