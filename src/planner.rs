//! Execution mode planning.
//!
//! The planner asks a small model how context should be retrieved for a
//! question and validates the free-text response into a tagged [`Plan`].
//! The call is non-deterministic, so parse failures are retried with the
//! same input; after exhausting retries the planner fails open to
//! [`Plan::Summary`] rather than blocking the user.

use crate::error::Result;
use crate::llm::{ChatMessage, LanguageModel};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, warn};

/// A validated execution plan for one question.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Retrieve around a requested time range; `None` means the whole video.
    Timestamps { range: Option<(f64, f64)> },
    /// Cluster the full video for topic coverage.
    Summary,
    /// Semantic search plus cross-encoder rerank.
    Query,
    /// Answer without touching any collection.
    Ignore,
}

impl Plan {
    /// The mode name used for prompt lookup and status reporting.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Plan::Timestamps { .. } => "timestamps",
            Plan::Summary => "summary",
            Plan::Query => "query",
            Plan::Ignore => "ignore",
        }
    }

    /// Build a plan from a caller-forced mode string. Forced modes carry no
    /// timestamp range.
    pub fn from_forced_mode(mode: &str) -> Option<Plan> {
        match mode {
            "timestamps" => Some(Plan::Timestamps { range: None }),
            "summary" => Some(Plan::Summary),
            "query" => Some(Plan::Query),
            "ignore" => Some(Plan::Ignore),
            _ => None,
        }
    }
}

/// Why a planner response was rejected.
#[derive(Error, Debug)]
pub enum PlanParseError {
    #[error("no JSON object in planner output")]
    NoJsonObject,

    #[error("planner output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("invalid timestamp_range")]
    InvalidRange,
}

fn think_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap())
}

fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*?\}").unwrap())
}

/// Parse a raw planner response into a validated plan.
///
/// Strips `<think>` blocks, extracts the first JSON object, and checks the
/// schema: `mode` ∈ {timestamps, summary, query}, `timestamp_range` either
/// null or a `[start, end]` pair with `start <= end`, and a range only
/// permitted in timestamps mode.
pub fn parse_plan(raw: &str) -> std::result::Result<Plan, PlanParseError> {
    let stripped = think_tag_re().replace_all(raw, "");
    let json_text = json_object_re()
        .find(stripped.trim())
        .ok_or(PlanParseError::NoJsonObject)?
        .as_str();

    let value: Value = serde_json::from_str(json_text)?;
    let object = value.as_object().ok_or(PlanParseError::NoJsonObject)?;

    let mode = object
        .get("mode")
        .ok_or(PlanParseError::MissingField("mode"))?
        .as_str()
        .ok_or(PlanParseError::InvalidMode("non-string".to_string()))?;

    let range_value = object
        .get("timestamp_range")
        .ok_or(PlanParseError::MissingField("timestamp_range"))?;

    let range = match range_value {
        Value::Null => None,
        Value::Array(items) if items.len() == 2 => {
            let start = items[0].as_f64().ok_or(PlanParseError::InvalidRange)?;
            let end = items[1].as_f64().ok_or(PlanParseError::InvalidRange)?;
            if start > end {
                return Err(PlanParseError::InvalidRange);
            }
            Some((start, end))
        }
        _ => return Err(PlanParseError::InvalidRange),
    };

    match mode {
        "timestamps" => Ok(Plan::Timestamps { range }),
        "summary" | "query" => {
            if range.is_some() {
                // A range is only meaningful in timestamps mode.
                return Err(PlanParseError::InvalidRange);
            }
            if mode == "summary" {
                Ok(Plan::Summary)
            } else {
                Ok(Plan::Query)
            }
        }
        other => Err(PlanParseError::InvalidMode(other.to_string())),
    }
}

/// Plans the retrieval mode for a question, with bounded retries.
pub struct ModePlanner {
    llm: Arc<dyn LanguageModel>,
    model: String,
    max_retries: usize,
}

impl ModePlanner {
    /// Create a new planner using the given model.
    pub fn new(llm: Arc<dyn LanguageModel>, model: &str, max_retries: usize) -> Self {
        Self {
            llm,
            model: model.to_string(),
            max_retries,
        }
    }

    /// Obtain a validated plan for the given planning conversation.
    ///
    /// Never fails: after `max_retries` rejected attempts the default
    /// summary plan is returned.
    pub async fn plan(&self, messages: &[ChatMessage]) -> Result<Plan> {
        for attempt in 1..=self.max_retries {
            match self.llm.generate(messages, &self.model, false).await {
                Ok(output) => match parse_plan(&output) {
                    Ok(plan) => {
                        debug!(mode = plan.mode_name(), attempt, "Planner produced a plan");
                        return Ok(plan);
                    }
                    Err(e) => {
                        warn!(attempt, "Rejected planner output: {}", e);
                    }
                },
                Err(e) => {
                    warn!(attempt, "Planner call failed: {}", e);
                }
            }
        }

        warn!(
            "Planner exhausted {} attempts, falling back to summary mode",
            self.max_retries
        );
        Ok(Plan::Summary)
    }
}
