//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use console::style;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => show(&settings),
        ConfigAction::Edit => edit(&settings)?,
        ConfigAction::Path => {
            println!("{}", Settings::default_config_path().display());
        }
    }

    Ok(())
}

/// Print the effective configuration: file values merged over defaults.
fn show(settings: &Settings) {
    Output::header("Effective configuration");

    section("llm");
    Output::kv("base_url", &settings.llm.base_url);
    Output::kv("answer_model", &settings.llm.answer_model);
    Output::kv("planner_model", &settings.llm.planner_model);

    section("embedding");
    Output::kv("speech_model", &settings.embedding.speech_model);
    Output::kv("visual_model", &settings.embedding.visual_model);
    Output::kv("dimensions", &settings.embedding.dimensions.to_string());

    section("reranker");
    Output::kv("base_url", &settings.reranker.base_url);
    Output::kv("model", &settings.reranker.model);

    section("retrieval");
    Output::kv("speech_targets", &settings.retrieval.speech_targets.to_string());
    Output::kv("visual_targets", &settings.retrieval.visual_targets.to_string());
    Output::kv(
        "query_candidates",
        &settings.retrieval.query_candidates.to_string(),
    );
    Output::kv(
        "window_margin_secs",
        &settings.retrieval.window_margin_secs.to_string(),
    );
    Output::kv("use_mmr", &settings.retrieval.use_mmr.to_string());

    section("planner");
    Output::kv("max_retries", &settings.planner.max_retries.to_string());

    section("ingestion");
    Output::kv("service_url", &settings.ingestion.service_url);
    Output::kv(
        "sample_interval_secs",
        &settings.ingestion.sample_interval_secs.to_string(),
    );

    section("store");
    Output::kv("segments_path", &settings.store.segments_path);
    Output::kv("chats_path", &settings.store.chats_path);
    Output::kv("metadata_path", &settings.store.metadata_path);
    Output::kv("history_window", &settings.store.history_window.to_string());

    println!();
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Loaded from {}", config_path.display()));
    } else {
        Output::info("No config file found; showing built-in defaults.");
        Output::info(&format!(
            "Run {} to create one.",
            style("skue config edit").cyan()
        ));
    }
}

fn section(name: &str) {
    println!("\n{}", style(format!("[{}]", name)).bold());
}

fn edit(settings: &Settings) -> Result<()> {
    let config_path = Settings::default_config_path();

    if !config_path.exists() {
        settings.save()?;
        Output::info(&format!("Created default config at {:?}", config_path));
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());
    Output::info(&format!("Opening config in {}...", editor));

    let status = std::process::Command::new(&editor)
        .arg(&config_path)
        .status();

    match status {
        Ok(s) if s.success() => {
            // Re-parse now so a typo surfaces here, not on the next ask.
            match Settings::load() {
                Ok(_) => Output::success("Config saved."),
                Err(e) => Output::warning(&format!("Config saved but does not parse: {}", e)),
            }
        }
        Ok(_) => {
            Output::warning("Editor exited with non-zero status.");
        }
        Err(e) => {
            Output::error(&format!("Failed to open editor: {}", e));
            Output::info(&format!("Config file is at: {:?}", config_path));
        }
    }

    Ok(())
}
