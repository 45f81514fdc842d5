//! Skue CLI entry point.

use anyhow::Result;
use clap::Parser;
use skue::cli::{commands, Cli, Commands};
use skue::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("skue={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure the data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Ingest { inputs, interval } => {
            commands::run_ingest(inputs, interval, settings).await?;
        }

        Commands::Ask {
            question,
            videos,
            chat,
            mode,
            think,
            images,
            documents,
        } => {
            commands::run_ask(
                &question, videos, chat, mode, think, images, documents, settings,
            )
            .await?;
        }

        Commands::Chat {
            videos,
            chat,
            think,
        } => {
            commands::run_chat(videos, chat, think, settings).await?;
        }

        Commands::Videos => {
            commands::run_videos(settings).await?;
        }

        Commands::Delete { video_id } => {
            commands::run_delete(&video_id, settings).await?;
        }

        Commands::Chats { action } => {
            commands::run_chats(&action, settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings)?;
        }
    }

    Ok(())
}
