//! Conversation orchestration.
//!
//! Ties the stores, planner, retriever and model clients into the ask flow:
//! summarize history, pick a plan, refine the query, retrieve context per
//! video, then stream the answer while persisting the exchange. The caller
//! gets an [`AnswerStream`] immediately; generation runs in a background
//! task so slow consumers only apply backpressure, never stall retrieval.

use crate::chat_store::{ChatStore, Role, StoredMessage};
use crate::config::{LlmSettings, Prompts};
use crate::error::{Result, SkueError};
use crate::llm::{AnswerChunk, AnswerStream, ChatMessage, LanguageModel};
use crate::metadata_store::{MetadataStore, VideoMetadata};
use crate::planner::{ModePlanner, Plan};
use crate::retrieval::ContextRetriever;
use base64::Engine;
use futures::StreamExt;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

const ANSWER_CHANNEL_CAPACITY: usize = 32;
const ATTACHMENT_POLL_ATTEMPTS: usize = 40;
const ATTACHMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A pipeline stage the orchestrator is about to run, surfaced so callers
/// can show progress while the model works.
#[derive(Debug, Clone, PartialEq)]
pub enum AskStage {
    SummarizingHistory {
        message_count: usize,
    },
    SelectingMode,
    RefiningQuery,
    RetrievingContext {
        video_index: usize,
        video_count: usize,
        video_name: String,
    },
    SummarizingVideo {
        video_index: usize,
        video_count: usize,
        video_name: String,
    },
    LoadingModel {
        model: String,
    },
}

/// Receives stage notifications during an ask.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, stage: AskStage);
}

/// Sink that drops all notifications.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn stage(&self, _stage: AskStage) {}
}

/// One question against a chat session.
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub chat_id: i64,
    pub question: String,
    /// Videos to draw context from, in caller order.
    pub video_ids: Vec<String>,
    /// Skip planning and use this mode directly.
    pub forced_mode: Option<String>,
    /// Stream thinking tokens from the answer model.
    pub think: bool,
}

/// Files accompanying a question.
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    /// Image paths, base64-encoded and attached to the question message.
    pub images: Vec<String>,
    /// Text document paths, inlined into the question.
    pub documents: Vec<String>,
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.documents.is_empty()
    }
}

fn strip_think_tags(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
    re.replace_all(text, "").trim().to_string()
}

/// Drives the full ask flow for chat sessions.
pub struct ChatOrchestrator {
    llm: Arc<dyn LanguageModel>,
    retriever: Arc<ContextRetriever>,
    planner: Arc<ModePlanner>,
    chats: Arc<ChatStore>,
    metadata: Arc<MetadataStore>,
    prompts: Arc<Prompts>,
    llm_settings: LlmSettings,
    history_window: usize,
}

impl ChatOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        retriever: Arc<ContextRetriever>,
        planner: Arc<ModePlanner>,
        chats: Arc<ChatStore>,
        metadata: Arc<MetadataStore>,
        prompts: Arc<Prompts>,
        llm_settings: LlmSettings,
        history_window: usize,
    ) -> Self {
        Self {
            llm,
            retriever,
            planner,
            chats,
            metadata,
            prompts,
            llm_settings,
            history_window,
        }
    }

    /// Answer a question, streaming the result.
    ///
    /// The user message is persisted before generation starts; the answer
    /// (and its thinking, if any) is persisted only after the stream
    /// completes, so an interrupted generation leaves the question intact
    /// and nothing else.
    pub async fn ask(
        &self,
        request: AskRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<AnswerStream> {
        self.ask_inner(request, Vec::new(), progress).await
    }

    /// Answer a question that carries file attachments.
    ///
    /// Attachment files may still be in flight from an upload, so each path
    /// is polled for a bounded time before reading. Documents are inlined
    /// into the question text; images ride along on the question message.
    /// The attachments themselves are the evidence, so planning and video
    /// retrieval are skipped.
    pub async fn ask_with_attachments(
        &self,
        mut request: AskRequest,
        attachments: Attachments,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<AnswerStream> {
        for path in attachments.images.iter().chain(&attachments.documents) {
            wait_for_file(path).await?;
        }

        for path in &attachments.documents {
            let name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());
            let text = std::fs::read_to_string(path)?;
            request
                .question
                .push_str(&format!("\n\nAttached document {}:\n{}", name, text));
        }

        let mut images = Vec::with_capacity(attachments.images.len());
        for path in &attachments.images {
            let bytes = std::fs::read(path)?;
            images.push(base64::engine::general_purpose::STANDARD.encode(bytes));
        }

        request.forced_mode = Some("ignore".to_string());
        self.ask_inner(request, images, progress).await
    }

    #[instrument(skip_all, fields(chat_id = request.chat_id, videos = request.video_ids.len()))]
    async fn ask_inner(
        &self,
        request: AskRequest,
        images: Vec<String>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<AnswerStream> {
        let history = self
            .chats
            .messages_for_llm(request.chat_id, self.history_window)?;

        let forced_plan = match &request.forced_mode {
            Some(mode) => Some(
                Plan::from_forced_mode(mode)
                    .ok_or_else(|| SkueError::InvalidInput(format!("Unknown mode: {}", mode)))?,
            ),
            None => None,
        };

        // The summary only exists to steer retrieval, so asks that cannot
        // retrieve (no targeted videos, or a forced ignore) go straight to
        // generation with the raw history.
        let conversation_summary = if request.video_ids.is_empty()
            || matches!(forced_plan, Some(Plan::Ignore))
        {
            String::new()
        } else {
            self.summarize_history(&history, &progress).await
        };

        let metadatas = self.load_metadatas(&request.video_ids)?;

        let plan = self
            .resolve_plan(
                forced_plan,
                &request.question,
                &metadatas,
                &conversation_summary,
                &progress,
            )
            .await?;
        info!(mode = plan.mode_name(), "Resolved plan");

        let retrieval_question = if plan == Plan::Query {
            self.refine_query(&request.question, &conversation_summary, &progress)
                .await
        } else {
            request.question.clone()
        };

        let mut messages = Vec::new();
        messages.push(ChatMessage::system(self.system_prompt(&plan, &metadatas)));
        for stored in &history {
            messages.push(ChatMessage {
                role: stored.role,
                content: stored.content.clone(),
                images: Vec::new(),
            });
        }
        if !conversation_summary.is_empty() {
            messages.push(ChatMessage::assistant(format!(
                "Summary of the conversation so far:\n{}",
                conversation_summary
            )));
        }

        if let Some(context_message) = self
            .assemble_context(&plan, &retrieval_question, &request.question, &metadatas, &progress)
            .await?
        {
            messages.push(ChatMessage::assistant(context_message));
        }

        // The model answers the refined question; history keeps the raw one.
        messages.push(ChatMessage::user(retrieval_question.clone()).with_images(images));

        progress.stage(AskStage::LoadingModel {
            model: self.llm_settings.answer_model.clone(),
        });

        // Question first; the answer only lands if the stream completes.
        self.chats
            .add_message(request.chat_id, Role::User, &request.question)?;

        self.spawn_title_task(request.chat_id, &request.question)?;

        let stream = self
            .llm
            .chat_stream(&messages, &self.llm_settings.answer_model, request.think)
            .await?;

        let (sender, receiver) = mpsc::channel(ANSWER_CHANNEL_CAPACITY);
        let chats = Arc::clone(&self.chats);
        let chat_id = request.chat_id;

        tokio::spawn(async move {
            let mut stream = stream;
            let mut thinking = String::new();
            let mut content = String::new();

            while let Some(step) = stream.next().await {
                match step {
                    Ok(delta) => {
                        if !delta.thinking.is_empty() {
                            thinking.push_str(&delta.thinking);
                            if sender
                                .send(Ok(AnswerChunk::Thinking(delta.thinking)))
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                        if !delta.content.is_empty() {
                            content.push_str(&delta.content);
                            if sender
                                .send(Ok(AnswerChunk::Content(delta.content)))
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                        if delta.done {
                            if !thinking.is_empty() {
                                if let Err(e) =
                                    chats.add_message(chat_id, Role::Thinking, &thinking)
                                {
                                    warn!("Failed to persist thinking: {}", e);
                                }
                            }
                            if let Err(e) = chats.add_message(chat_id, Role::Assistant, &content) {
                                warn!("Failed to persist answer: {}", e);
                            }
                            let _ = sender.send(Ok(AnswerChunk::Done)).await;
                            return;
                        }
                    }
                    Err(e) => {
                        // Partial output is discarded; the question stays.
                        let _ = sender.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Ok(receiver)
    }

    async fn summarize_history(
        &self,
        history: &[StoredMessage],
        progress: &Arc<dyn ProgressSink>,
    ) -> String {
        if history.is_empty() {
            return String::new();
        }

        progress.stage(AskStage::SummarizingHistory {
            message_count: history.len(),
        });

        let mut messages = vec![ChatMessage::system(
            self.prompts.tasks.history_summary_system.clone(),
        )];
        for stored in history {
            messages.push(ChatMessage {
                role: stored.role,
                content: stored.content.clone(),
                images: Vec::new(),
            });
        }
        messages.push(ChatMessage::user(
            self.prompts.tasks.history_summary_user.clone(),
        ));

        match self
            .llm
            .generate(&messages, &self.llm_settings.planner_model, false)
            .await
        {
            Ok(summary) => strip_think_tags(&summary),
            Err(e) => {
                warn!("History summarization failed, continuing without: {}", e);
                String::new()
            }
        }
    }

    fn load_metadatas(&self, video_ids: &[String]) -> Result<Vec<VideoMetadata>> {
        video_ids
            .iter()
            .map(|id| {
                self.metadata
                    .get(id)?
                    .ok_or_else(|| SkueError::VideoNotFound(id.clone()))
            })
            .collect()
    }

    async fn resolve_plan(
        &self,
        forced_plan: Option<Plan>,
        question: &str,
        metadatas: &[VideoMetadata],
        conversation_summary: &str,
        progress: &Arc<dyn ProgressSink>,
    ) -> Result<Plan> {
        if let Some(plan) = forced_plan {
            return Ok(plan);
        }

        if metadatas.is_empty() {
            return Ok(Plan::Ignore);
        }

        progress.stage(AskStage::SelectingMode);

        let video_metadatas = metadatas
            .iter()
            .map(|m| m.prompt_context())
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut vars = HashMap::new();
        vars.insert("video_metadatas".to_string(), video_metadatas);
        let planning_prompt = self
            .prompts
            .render_with_custom(&self.prompts.modes.planning, &vars);

        let mut messages = vec![ChatMessage::system(planning_prompt)];
        if !conversation_summary.is_empty() {
            messages.push(ChatMessage::assistant(format!(
                "Summary of the conversation so far:\n{}",
                conversation_summary
            )));
        }
        messages.push(ChatMessage::user(question.to_string()));

        self.planner.plan(&messages).await
    }

    async fn refine_query(
        &self,
        question: &str,
        conversation_summary: &str,
        progress: &Arc<dyn ProgressSink>,
    ) -> String {
        progress.stage(AskStage::RefiningQuery);

        let mut vars = HashMap::new();
        vars.insert(
            "conversation_summary".to_string(),
            conversation_summary.to_string(),
        );
        vars.insert("user_question".to_string(), question.to_string());
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.tasks.refine_system, &vars);

        match self
            .llm
            .generate(
                &[ChatMessage::system(prompt), ChatMessage::user(question)],
                &self.llm_settings.planner_model,
                false,
            )
            .await
        {
            Ok(refined) => {
                let refined = strip_think_tags(&refined);
                if refined.is_empty() {
                    question.to_string()
                } else {
                    debug!(refined = %refined, "Refined retrieval query");
                    refined
                }
            }
            Err(e) => {
                warn!("Query refinement failed, using the raw question: {}", e);
                question.to_string()
            }
        }
    }

    fn system_prompt(&self, plan: &Plan, metadatas: &[VideoMetadata]) -> String {
        if metadatas.is_empty() {
            return self.prompts.modes.generic.clone();
        }
        let template = match plan {
            Plan::Timestamps { .. } => &self.prompts.modes.timestamps,
            Plan::Summary => &self.prompts.modes.summary,
            Plan::Query => &self.prompts.modes.query,
            Plan::Ignore => &self.prompts.modes.ignore,
        };
        self.prompts.render_with_custom(template, &HashMap::new())
    }

    /// Retrieve and package context for the videos. One video yields its raw
    /// context; several are each summarized first so the combined block
    /// stays small enough for the answer model. `None` when there is nothing
    /// to retrieve.
    async fn assemble_context(
        &self,
        plan: &Plan,
        retrieval_question: &str,
        original_question: &str,
        metadatas: &[VideoMetadata],
        progress: &Arc<dyn ProgressSink>,
    ) -> Result<Option<String>> {
        if metadatas.is_empty() || *plan == Plan::Ignore {
            return Ok(None);
        }

        if metadatas.len() == 1 {
            progress.stage(AskStage::RetrievingContext {
                video_index: 0,
                video_count: 1,
                video_name: metadatas[0].video_id.clone(),
            });
            let context = self
                .retriever
                .retrieve(plan, retrieval_question, &metadatas[0])
                .await?;
            return Ok(Some(format!(
                "Here is the relevant context of the videos: \n{}",
                context
            )));
        }

        let mut blocks = Vec::with_capacity(metadatas.len());
        for (index, metadata) in metadatas.iter().enumerate() {
            progress.stage(AskStage::RetrievingContext {
                video_index: index,
                video_count: metadatas.len(),
                video_name: metadata.video_id.clone(),
            });
            let context = self
                .retriever
                .retrieve(plan, retrieval_question, metadata)
                .await?;

            progress.stage(AskStage::SummarizingVideo {
                video_index: index,
                video_count: metadatas.len(),
                video_name: metadata.video_id.clone(),
            });
            let summary = self.summarize_video(original_question, &context).await?;

            blocks.push(format!(
                "=== Video {} ===\nVideo name: {}\nVideo summary: \n{}\n\n",
                index + 1,
                metadata.video_id,
                summary
            ));
        }

        Ok(Some(format!(
            "Here is the relevant context of the videos: \n{}",
            blocks.concat()
        )))
    }

    async fn summarize_video(&self, question: &str, context: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        let user_prompt = self
            .prompts
            .render_with_custom(&self.prompts.tasks.video_summary_user, &vars);

        let summary = self
            .llm
            .generate(
                &[
                    ChatMessage::system(self.prompts.tasks.video_summary_system.clone()),
                    ChatMessage::user(user_prompt),
                ],
                &self.llm_settings.answer_model,
                false,
            )
            .await?;
        Ok(strip_think_tags(&summary))
    }

    /// Name an unnamed session off the critical path. Failures are logged
    /// and swallowed; a missing title never fails an ask.
    fn spawn_title_task(&self, chat_id: i64, question: &str) -> Result<()> {
        if self.chats.session_name(chat_id)?.is_some() {
            return Ok(());
        }

        let llm = Arc::clone(&self.llm);
        let chats = Arc::clone(&self.chats);
        let model = self.llm_settings.planner_model.clone();
        let system = self.prompts.tasks.title_system.clone();
        let question = question.to_string();

        tokio::spawn(async move {
            let messages = [ChatMessage::system(system), ChatMessage::user(question)];
            match llm.generate(&messages, &model, false).await {
                Ok(title) => {
                    let title = strip_think_tags(&title);
                    let title = title.trim_matches('"').trim();
                    if title.is_empty() {
                        return;
                    }
                    if let Err(e) = chats.update_session_name(chat_id, title) {
                        warn!(chat_id, "Failed to store chat title: {}", e);
                    }
                }
                Err(e) => warn!(chat_id, "Title generation failed: {}", e),
            }
        });

        Ok(())
    }
}

async fn wait_for_file(path: &str) -> Result<()> {
    for _ in 0..ATTACHMENT_POLL_ATTEMPTS {
        if Path::new(path).exists() {
            return Ok(());
        }
        tokio::time::sleep(ATTACHMENT_POLL_INTERVAL).await;
    }
    Err(SkueError::InvalidInput(format!(
        "Attachment not found: {}",
        path
    )))
}
