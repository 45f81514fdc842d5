//! CLI module for Skue.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Skue - Video Question Answering
///
/// A local-first CLI for asking questions about ingested videos, grounded in
/// transcribed speech and captioned frames. The name "Skue" comes from the
/// Norwegian word for "behold/view."
#[derive(Parser, Debug)]
#[command(name = "skue")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Skue and verify configuration
    Init,

    /// Ingest one or more video files
    Ingest {
        /// Video file paths
        inputs: Vec<String>,

        /// Frame sampling interval in seconds
        #[arg(short, long)]
        interval: Option<f64>,
    },

    /// Ask a single question about one or more videos
    Ask {
        /// The question to ask
        question: String,

        /// Video to draw context from (repeatable, order preserved)
        #[arg(short = 'V', long = "video")]
        videos: Vec<String>,

        /// Continue an existing chat session
        #[arg(long)]
        chat: Option<i64>,

        /// Force a retrieval mode (timestamps, summary, query, ignore)
        #[arg(short, long)]
        mode: Option<String>,

        /// Stream the model's thinking tokens
        #[arg(long)]
        think: bool,

        /// Attach an image file to the question (repeatable)
        #[arg(long = "image")]
        images: Vec<String>,

        /// Attach a text document to the question (repeatable)
        #[arg(long = "document")]
        documents: Vec<String>,
    },

    /// Start an interactive chat session about videos
    Chat {
        /// Video to draw context from (repeatable, order preserved)
        #[arg(short = 'V', long = "video")]
        videos: Vec<String>,

        /// Resume an existing chat session
        #[arg(long)]
        chat: Option<i64>,

        /// Stream the model's thinking tokens
        #[arg(long)]
        think: bool,
    },

    /// List ingested videos and their task status
    Videos,

    /// Delete a video's segments and metadata
    Delete {
        /// Video to delete
        video_id: String,
    },

    /// Manage chat sessions
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChatsAction {
    /// List all chat sessions
    List,

    /// Show a session's message history
    Show {
        /// Session id
        chat_id: i64,
    },

    /// Delete a session's messages, keeping the session
    Clear {
        /// Session id
        chat_id: i64,
    },

    /// Delete a session and its messages
    Delete {
        /// Session id
        chat_id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
