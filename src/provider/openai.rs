//! OpenAI-compatible chat completions client, batch and server-sent-event streaming.

use super::{ChatMessage, CompletionOptions, CompletionResponse, CompletionStream, ModelProviderClient};
use crate::error::GenerationError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChunkResponse {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

fn map_http_error(error: reqwest::Error) -> GenerationError {
    if let Some(status) = error.status() {
        GenerationError::Backend(format!("Request failed with status {}: {}", status, error))
    } else if error.is_timeout() {
        GenerationError::Backend(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        GenerationError::Backend(format!("Connection error: {}", error))
    } else {
        GenerationError::Backend(format!("HTTP error: {}", error))
    }
}

fn map_status_error(status: reqwest::StatusCode, body: String) -> GenerationError {
    match status.as_u16() {
        401 => GenerationError::Backend(format!("Authentication failed: {}", body)),
        404 => GenerationError::Backend(format!("Model not found: {}", body)),
        429 => GenerationError::Backend(format!("Rate limit exceeded: {}", body)),
        _ => GenerationError::Backend(format!("Request failed ({}): {}", status, body)),
    }
}

/// Client for any endpoint speaking the `/chat/completions` protocol.
///
/// Request-level timeouts are left to `backend::TimeoutBackend` so that streaming
/// responses are not cut off by a whole-request deadline.
pub struct OpenAiCompatibleClient {
    client: Client,
    provider_name: &'static str,
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        provider_name: &'static str,
        model: String,
        api_key: Option<String>,
        base_url: String,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::Backend(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            provider_name,
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
        stream: bool,
    ) -> Result<reqwest::Response, GenerationError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: messages
                .into_iter()
                .map(|msg| WireMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content,
                })
                .collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await.map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_error(status, body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelProviderClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, GenerationError> {
        let response = self.post(messages, options, false).await?;
        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Backend(format!("Failed to parse response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Backend("No choices in response".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content,
            model: completion.model,
            finish_reason: choice.finish_reason,
        })
    }

    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionStream, GenerationError> {
        let response = self.post(messages, options, true).await?;
        debug!(provider = self.provider_name, model = %self.model, "Streaming response opened");
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();
        Ok(sse_fragments(bytes))
    }

    fn provider_name(&self) -> &str {
        self.provider_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// One decoded `data:` line of a completion event stream
#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Fragment(String),
    Done,
    Ignored,
}

fn parse_sse_line(line: &str) -> Result<SseLine, GenerationError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseLine::Ignored);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }
    let chunk: ChunkResponse = serde_json::from_str(payload)
        .map_err(|e| GenerationError::Backend(format!("Malformed stream chunk: {}", e)))?;
    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();
    if text.is_empty() {
        Ok(SseLine::Ignored)
    } else {
        Ok(SseLine::Fragment(text))
    }
}

struct SseState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, GenerationError>>,
    finished: bool,
}

impl SseState {
    /// Decode every complete line in the buffer; returns false once `[DONE]` or an error is seen
    fn drain_lines(&mut self, flush: bool) -> bool {
        loop {
            let line = match self.buffer.iter().position(|b| *b == b'\n') {
                Some(idx) => {
                    let line: Vec<u8> = self.buffer.drain(..=idx).collect();
                    line
                }
                None if flush && !self.buffer.is_empty() => std::mem::take(&mut self.buffer),
                None => return true,
            };
            match parse_sse_line(&String::from_utf8_lossy(&line)) {
                Ok(SseLine::Fragment(text)) => self.pending.push_back(Ok(text)),
                Ok(SseLine::Ignored) => {}
                Ok(SseLine::Done) => return false,
                Err(e) => {
                    self.pending.push_back(Err(e));
                    return false;
                }
            }
        }
    }
}

fn sse_fragments(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> CompletionStream {
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    if !state.drain_lines(false) {
                        state.finished = true;
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(map_http_error(e)));
                    state.finished = true;
                }
                None => {
                    state.drain_lines(true);
                    state.finished = true;
                }
            }
        }
    }))
}
