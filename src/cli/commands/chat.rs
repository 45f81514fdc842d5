//! Interactive chat command.

use super::ask::{resolve_session, stream_answer};
use super::{build_engine, CliProgress};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::AskRequest;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Run the interactive chat command.
pub async fn run_chat(
    videos: Vec<String>,
    chat: Option<i64>,
    think: bool,
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

    println!("\n{}", style("Skue Chat").bold().cyan());
    if videos.is_empty() {
        println!("{}", style("No videos attached; answering without video context.").dim());
    } else {
        println!("{} {}", style("Videos:").dim(), videos.join(", "));
    }
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset the conversation.")
            .dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            engine.chats.clear_history(chat_id)?;
            Output::info("Conversation history cleared.");
            continue;
        }

        let request = AskRequest {
            chat_id,
            question: input.to_string(),
            video_ids: videos.clone(),
            forced_mode: None,
            think,
        };

        match engine.orchestrator.ask(request, Arc::new(CliProgress)).await {
            Ok(stream) => {
                print!("\n{} ", style("Skue:").cyan().bold());
                stdout.flush()?;
                if let Err(e) = stream_answer(stream).await {
                    Output::error(&format!("Generation failed: {}", e));
                }
                println!("\n");
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
