//! Streaming Ollama chat client.
//!
//! Behaviour:
//! - `POST /api/chat` with `stream: true` and the configured system prompt first.
//! - The response body is newline-delimited JSON; every frame carrying
//!   `message.content` becomes a [`OracleEvent::TextDelta`].
//! - Frames without text (tool calls, the final `done` frame) become
//!   [`OracleEvent::Other`]; an `error` frame ends the stream with an error.

use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::conversations::core::config::LlmConfig;
use crate::conversations::types::Role;
use crate::llm::oracle::{
    ChatMessage, ChatOracle, OracleError, OracleEvent, OracleFuture, OracleResult, OracleStream,
};

/// Connect timeout for the oracle endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    keep_alive: &'a str,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatFrame {
    #[serde(default)]
    message: Option<FrameMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one NDJSON line. Blank lines yield nothing.
fn decode_frame(line: &[u8]) -> Option<OracleResult<OracleEvent>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let frame: ChatFrame = match serde_json::from_slice(line) {
        Ok(frame) => frame,
        Err(err) => return Some(Err(OracleError::from(err))),
    };

    if let Some(message) = frame.error {
        return Some(Err(OracleError::Remote(message)));
    }

    let event = match frame.message {
        Some(message) if !message.content.is_empty() => OracleEvent::TextDelta(message.content),
        Some(message) if message.tool_calls.is_some() => {
            OracleEvent::Other("tool_calls".to_string())
        }
        _ if frame.done => OracleEvent::Other("done".to_string()),
        _ => OracleEvent::Other("empty".to_string()),
    };
    Some(Ok(event))
}

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Add bytes and return every line completed by them.
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            lines.push(self.pending.drain(..=pos).collect());
        }
        lines
    }

    /// Remaining bytes after the body ended.
    fn finish(self) -> Vec<u8> {
        self.pending
    }
}

fn frames(response: reqwest::Response) -> OracleStream {
    Box::pin(stream! {
        let mut body = response.bytes_stream();
        let mut buffer = LineBuffer::default();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(OracleError::from(err));
                    return;
                }
            };
            for line in buffer.push(&chunk) {
                if let Some(event) = decode_frame(&line) {
                    let failed = event.is_err();
                    yield event;
                    if failed {
                        return;
                    }
                }
            }
        }

        if let Some(event) = decode_frame(&buffer.finish()) {
            yield event;
        }
    })
}

/// Async Ollama chat client.
pub struct OllamaChat {
    client: Client,
    config: LlmConfig,
}

impl OllamaChat {
    /// Create a client for the configured Ollama server.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> OracleResult<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    /// Model name in use.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl ChatOracle for OllamaChat {
    fn stream_chat(&self, history: Vec<ChatMessage>) -> OracleFuture<'_, OracleResult<OracleStream>> {
        Box::pin(async move {
            let mut messages = Vec::with_capacity(history.len() + 1);
            if !self.config.system_prompt.is_empty() {
                messages.push(WireMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                });
            }
            messages.extend(history.iter().map(|m| WireMessage {
                role: Role::as_str(m.role),
                content: &m.content,
            }));

            let request = ChatRequest {
                model: &self.config.model,
                messages,
                stream: true,
                keep_alive: &self.config.keep_alive,
                options: ChatOptions {
                    temperature: self.config.temperature,
                },
            };

            let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));
            let response = self.client.post(&url).json(&request).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(OracleError::HttpStatusNotOk(status.as_u16()));
            }

            tracing::debug!("Streaming chat from {} with {} messages", self.config.model, history.len());
            Ok(frames(response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frames_become_deltas() {
        let line = br#"{"model":"m","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        assert_eq!(
            decode_frame(line).unwrap().unwrap(),
            OracleEvent::TextDelta("Hel".to_string())
        );
    }

    #[test]
    fn non_text_frames_are_other_events() {
        let done = br#"{"message":{"role":"assistant","content":""},"done":true,"eval_count":3}"#;
        assert_eq!(
            decode_frame(done).unwrap().unwrap(),
            OracleEvent::Other("done".to_string())
        );

        let tool = br#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"add"}}]},"done":false}"#;
        assert_eq!(
            decode_frame(tool).unwrap().unwrap(),
            OracleEvent::Other("tool_calls".to_string())
        );
    }

    #[test]
    fn error_and_garbage_frames_fail() {
        assert!(matches!(
            decode_frame(br#"{"error":"model not found"}"#),
            Some(Err(OracleError::Remote(message))) if message == "model not found"
        ));
        assert!(matches!(
            decode_frame(b"not json"),
            Some(Err(OracleError::MalformedFrame(_)))
        ));
        assert!(decode_frame(b"  \r\n").is_none());
    }

    #[test]
    fn line_buffer_reassembles_split_frames() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"{\"done\":").is_empty());
        let lines = buffer.push(b"false}\n{\"done\":true}\n{\"tail\"");
        assert_eq!(lines, vec![b"{\"done\":false}\n".to_vec(), b"{\"done\":true}\n".to_vec()]);
        assert_eq!(buffer.finish(), b"{\"tail\"".to_vec());
    }

    #[test]
    fn request_serializes_to_ollama_shape() {
        let request = ChatRequest {
            model: "m",
            messages: vec![WireMessage {
                role: "user",
                content: "hi",
            }],
            stream: true,
            keep_alive: "1h",
            options: ChatOptions { temperature: 0.5 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], true);
        assert_eq!(json["options"]["temperature"], 0.5);
    }
}
