//! Ollama-compatible chat client.
//!
//! Speaks the `/api/chat` protocol: JSON request, NDJSON response when
//! streaming. Thinking tokens arrive on `message.thinking`, answer tokens on
//! `message.content`.

use super::{ChatDelta, ChatDeltaStream, ChatMessage, LanguageModel};
use crate::error::{Result, SkueError};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, instrument};

/// Client for an Ollama-compatible chat endpoint.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    think: bool,
}

#[derive(Deserialize, Default)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: ChatResponseMessage,
    #[serde(default)]
    done: bool,
}

impl ChatResponse {
    fn into_delta(self) -> ChatDelta {
        ChatDelta {
            content: self.message.content,
            thinking: self.message.thinking,
            done: self.done,
        }
    }
}

impl OllamaClient {
    /// Create a new client for the given base URL.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    #[instrument(skip(self, messages), fields(model = %model, count = messages.len()))]
    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: &str,
        think: bool,
    ) -> Result<String> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
            think,
        };

        let response = self
            .http
            .post(self.chat_url())
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SkueError::Llm(format!("Chat request failed: {}", e)))?;

        let parsed: ChatResponse = response.json().await?;
        debug!("Received {} chars", parsed.message.content.len());
        Ok(parsed.message.content)
    }

    #[instrument(skip(self, messages), fields(model = %model, count = messages.len()))]
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
        think: bool,
    ) -> Result<ChatDeltaStream> {
        let request = ChatRequest {
            model,
            messages,
            stream: true,
            think,
        };

        let response = self
            .http
            .post(self.chat_url())
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SkueError::Llm(format!("Chat request failed: {}", e)))?;

        let bytes = response.bytes_stream().boxed();

        // NDJSON: buffer raw bytes across chunks and emit one delta per
        // complete line. Splitting happens in byte space so a multi-byte
        // character straddling a chunk boundary is never decoded early.
        let stream = futures::stream::try_unfold(
            (bytes, Vec::<u8>::new(), VecDeque::<ChatDelta>::new(), false),
            |(mut bytes, mut buffer, mut pending, mut exhausted)| async move {
                loop {
                    if let Some(delta) = pending.pop_front() {
                        return Ok(Some((delta, (bytes, buffer, pending, exhausted))));
                    }
                    if exhausted {
                        return Ok(None);
                    }

                    match bytes.next().await {
                        Some(chunk) => {
                            let chunk = chunk.map_err(SkueError::Http)?;
                            buffer.extend_from_slice(&chunk);
                            drain_complete_lines(&mut buffer, &mut pending)?;
                        }
                        None => {
                            exhausted = true;
                            let line = std::mem::take(&mut buffer);
                            if let Some(delta) = parse_line(&line)? {
                                pending.push_back(delta);
                            }
                        }
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}

/// Pop every complete newline-terminated line off the buffer, parsing each
/// into a delta. Bytes after the last newline stay buffered.
fn drain_complete_lines(buffer: &mut Vec<u8>, pending: &mut VecDeque<ChatDelta>) -> Result<()> {
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        if let Some(delta) = parse_line(&line)? {
            pending.push_back(delta);
        }
    }
    Ok(())
}

fn parse_line(line: &[u8]) -> Result<Option<ChatDelta>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| SkueError::Llm(format!("Invalid UTF-8 in stream: {}", e)))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }
    let parsed: ChatResponse = serde_json::from_str(text)?;
    Ok(Some(parsed.into_delta()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_parsing() {
        let line = r#"{"message":{"content":"hello","thinking":""},"done":false}"#;
        let parsed: ChatResponse = serde_json::from_str(line).unwrap();
        let delta = parsed.into_delta();
        assert_eq!(delta.content, "hello");
        assert!(!delta.done);

        // Final chunks may omit the message body entirely.
        let line = r#"{"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(line).unwrap();
        assert!(parsed.into_delta().done);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let payload = format!(
            "{}\n",
            r#"{"message":{"content":"héllo ✓","thinking":""},"done":false}"#
        );
        let bytes = payload.as_bytes();
        // Cut inside the two-byte 'é'.
        let cut = payload.find('é').unwrap() + 1;

        let mut buffer = Vec::new();
        let mut pending = VecDeque::new();

        buffer.extend_from_slice(&bytes[..cut]);
        drain_complete_lines(&mut buffer, &mut pending).unwrap();
        assert!(pending.is_empty());

        buffer.extend_from_slice(&bytes[cut..]);
        drain_complete_lines(&mut buffer, &mut pending).unwrap();
        let delta = pending.pop_front().unwrap();
        assert_eq!(delta.content, "héllo ✓");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_base_url_normalized() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.chat_url(), "http://localhost:11434/api/chat");
    }
}
