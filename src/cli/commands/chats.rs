//! Chats command implementation.

use super::build_engine;
use crate::cli::{ChatsAction, Output};
use crate::config::Settings;
use anyhow::Result;
use console::style;

/// Run the chats command.
pub fn run_chats(action: &ChatsAction, settings: Settings) -> Result<()> {
    let engine = build_engine(&settings)?;

    match action {
        ChatsAction::List => {
            let sessions = engine.chats.list_sessions()?;
            if sessions.is_empty() {
                Output::info("No chat sessions yet. Use 'skue ask' or 'skue chat' to start one.");
                return Ok(());
            }

            Output::header(&format!("Chat Sessions ({})", sessions.len()));
            println!();
            for session in &sessions {
                Output::chat_info(
                    session.chat_id,
                    session.chat_name.as_deref(),
                    &session.last_updated.format("%Y-%m-%d %H:%M").to_string(),
                );
            }
        }

        ChatsAction::Show { chat_id } => {
            let history = engine.chats.history(*chat_id)?;
            if history.is_empty() {
                Output::info(&format!("Chat {} has no messages.", chat_id));
                return Ok(());
            }

            let name = engine.chats.session_name(*chat_id)?;
            Output::header(&format!(
                "Chat {} - {}",
                chat_id,
                name.as_deref().unwrap_or("(untitled)")
            ));
            println!();
            for message in &history {
                println!(
                    "{} {}",
                    style(format!("[{}]", message.role)).dim(),
                    message.content
                );
            }
        }

        ChatsAction::Clear { chat_id } => {
            engine.chats.clear_history(*chat_id)?;
            Output::success(&format!("Cleared history of chat {}.", chat_id));
        }

        ChatsAction::Delete { chat_id } => {
            engine.chats.delete_session(*chat_id)?;
            Output::success(&format!("Deleted chat {}.", chat_id));
        }
    }

    Ok(())
}
