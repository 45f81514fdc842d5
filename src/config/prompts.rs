//! Prompt templates for Skue.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    /// System prompts per retrieval mode, plus the planning prompt.
    pub modes: ModePrompts,
    /// Prompts for auxiliary LLM tasks (summaries, refinement, titles).
    pub tasks: TaskPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Mode selection and per-mode answer prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModePrompts {
    pub planning: String,
    pub timestamps: String,
    pub summary: String,
    pub query: String,
    pub ignore: String,
    pub generic: String,
}

impl Default for ModePrompts {
    fn default() -> Self {
        Self {
            planning: r#"You are a retrieval planner for a video question-answering system.

The user is asking about videos with the following metadata:
{{video_metadatas}}

Decide how context should be retrieved for the question and respond with a single JSON object, nothing else:
{"mode": <"timestamps" | "summary" | "query">, "timestamp_range": [<start_seconds>, <end_seconds>] | null}

Rules:
- "timestamps": the question targets a specific time range of the video (e.g. "what happens around 2:30", "the first five minutes"). Set timestamp_range to that range in seconds.
- "summary": the question asks about the video as a whole (e.g. "what is this video about", "summarize it"). Set timestamp_range to null.
- "query": the question asks about a specific topic, object, person or event without naming a time (e.g. "what color is the car"). Set timestamp_range to null.
- timestamp_range must be null unless mode is "timestamps"."#
                .to_string(),

            timestamps: r#"You are a helpful assistant that answers questions about videos. The user asked about a specific time range; the context below contains speech transcripts and visual scene descriptions from that part of the video. Answer using only this context and say so clearly when it does not contain the answer."#
                .to_string(),

            summary: r#"You are a helpful assistant that answers questions about videos. The context below contains representative speech transcripts and visual scene descriptions sampled across the whole video. Use it to give a faithful overview; do not invent content that is not in the context."#
                .to_string(),

            query: r#"You are a helpful assistant that answers questions about videos. The context below contains the speech transcripts and visual scene descriptions most relevant to the user's question, ordered by relevance. Ground your answer in this context and cite timestamps where helpful."#
                .to_string(),

            ignore: r#"You are a helpful assistant. Answer the user's question directly without consulting video context."#
                .to_string(),

            generic: "You are a helpful assistant that can answer questions.".to_string(),
        }
    }
}

/// Prompts for auxiliary LLM tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPrompts {
    pub history_summary_system: String,
    pub history_summary_user: String,
    pub refine_system: String,
    pub title_system: String,
    pub video_summary_system: String,
    pub video_summary_user: String,
}

impl Default for TaskPrompts {
    fn default() -> Self {
        Self {
            history_summary_system:
                "You are an expert conversation analyst and summarizer. Your task is to create comprehensive summaries that capture ALL important information from conversations."
                    .to_string(),

            history_summary_user: r#"Analyze the entire conversation history and create a comprehensive summary following these guidelines:

1. Identify ALL distinct topics discussed, in chronological order
2. For each topic, capture the key questions, answers and conclusions
3. Highlight what was discussed in the most recent exchanges
4. Include specific examples, numbers, names and technical details
5. Note any questions that were not fully answered

Do not omit any topic, even a brief one. Be thorough but concise."#
                .to_string(),

            refine_system: r#"You are a query reformulator for a retrieval-augmented generation system.
Given:
- A conversation summary:
{{conversation_summary}}
- A user question:
{{user_question}}

Produce a single, concise search query that captures the user's intent for retrieval. Output *only* the query string without additional commentary."#
                .to_string(),

            title_system:
                "You are a helpful assistant. You are given a message. Give a title for the chat based on the message, around 5 words or less. The title should summarize the message itself, not its answer."
                    .to_string(),

            video_summary_system:
                "You summarize video evidence. Given retrieved context from one video and a question, write a focused summary of what the video contains that is relevant to the question. Mention timestamps when the context provides them."
                    .to_string(),

            video_summary_user: r#"Question: {{question}}

Retrieved context from the video:
{{context}}

Summarize what this video contributes to answering the question."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from defaults, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let modes_path = custom_path.join("modes.toml");
            if modes_path.exists() {
                let content = std::fs::read_to_string(&modes_path)?;
                prompts.modes = toml::from_str(&content)?;
            }

            let tasks_path = custom_path.join("tasks.toml");
            if tasks_path.exists() {
                let content = std::fs::read_to_string(&tasks_path)?;
                prompts.tasks = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.modes.planning.is_empty());
        assert!(!prompts.modes.summary.is_empty());
        assert!(!prompts.tasks.refine_system.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Question: {{question}} with {{count}} videos.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("question".to_string(), "what happened".to_string());
        vars.insert("count".to_string(), "2".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Question: what happened with 2 videos.");
    }
}
