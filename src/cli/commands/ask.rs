//! Ask command implementation.

use super::{build_engine, CliProgress};
use crate::chat_store::ChatStore;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::llm::{AnswerChunk, AnswerStream};
use crate::orchestrator::{AskRequest, Attachments};
use anyhow::Result;
use console::style;
use std::io::Write;
use std::sync::Arc;

/// Run the ask command.
#[allow(clippy::too_many_arguments)]
pub async fn run_ask(
    question: &str,
    videos: Vec<String>,
    chat: Option<i64>,
    mode: Option<String>,
    think: bool,
    images: Vec<String>,
    documents: Vec<String>,
    settings: Settings,
) -> Result<()> {
    if !videos.is_empty() {
        if let Err(e) = preflight::check(Operation::Ask) {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    }

    let engine = build_engine(&settings)?;
    let chat_id = resolve_session(&engine.chats, chat)?;

    let request = AskRequest {
        chat_id,
        question: question.to_string(),
        video_ids: videos,
        forced_mode: mode,
        think,
    };

    let attachments = Attachments { images, documents };
    let stream = if attachments.is_empty() {
        engine.orchestrator.ask(request, Arc::new(CliProgress)).await?
    } else {
        engine
            .orchestrator
            .ask_with_attachments(request, attachments, Arc::new(CliProgress))
            .await?
    };

    println!();
    stream_answer(stream).await?;
    println!();

    Ok(())
}

/// Reuse the given session or start a new one.
pub(crate) fn resolve_session(
    chats: &ChatStore,
    chat: Option<i64>,
) -> crate::error::Result<i64> {
    match chat {
        Some(chat_id) => Ok(chat_id),
        None => {
            let chat_id = chats.next_session_id()?;
            chats.create_session(chat_id, None)?;
            Ok(chat_id)
        }
    }
}

/// Print an answer stream, thinking tokens dimmed, until Done or error.
pub(crate) async fn stream_answer(mut stream: AnswerStream) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut in_thinking = false;

    while let Some(chunk) = stream.recv().await {
        match chunk? {
            AnswerChunk::Thinking(text) => {
                in_thinking = true;
                print!("{}", style(text).dim());
                stdout.flush()?;
            }
            AnswerChunk::Content(text) => {
                if in_thinking {
                    in_thinking = false;
                    println!("\n");
                }
                print!("{}", text);
                stdout.flush()?;
            }
            AnswerChunk::Done => break,
        }
    }

    Ok(())
}
