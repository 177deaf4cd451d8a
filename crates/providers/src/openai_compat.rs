//! OpenAI-compatible provider implementation.
//!
//! Works with: DeepSeek, OpenAI, OpenRouter, Ollama, vLLM, and any
//! OpenAI-compatible endpoint.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Tool use / function calling
//! - DeepSeek-style `reasoning_content` deltas
//! - JSON mode via `response_format`

use async_trait::async_trait;
use futures::StreamExt;
use glossa_core::error::ProviderError;
use glossa_core::message::{MessageToolCall, ModelMessage, Role};
use glossa_core::provider::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM provider.
///
/// This handles the vast majority of LLM providers since most expose
/// an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        // No overall timeout: reasoning streams can run for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create a DeepSeek provider (convenience constructor).
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::new("deepseek", "https://api.deepseek.com/v1", api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our message types to OpenAI API format.
    fn to_api_messages(system: Option<&str>, messages: &[ModelMessage]) -> Vec<ApiMessage> {
        let system = system.map(|s| ApiMessage {
            role: "system".into(),
            content: Some(s.to_string()),
            tool_calls: None,
            tool_call_id: None,
            reasoning_content: None,
        });

        system
            .into_iter()
            .chain(messages.iter().map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: if m.content.is_empty() && !m.tool_calls.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                },
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
                reasoning_content: None,
            }))
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Build the `/chat/completions` request body.
    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request.system.as_deref(), &request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        if request.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    /// POST a body and map HTTP failures onto provider errors.
    async fn post(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    async fn complete_uncancelled(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, json_mode = request.json_mode, "Sending completion request");

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let message = ModelMessage {
            tool_calls,
            ..ModelMessage::assistant(choice.message.content.unwrap_or_default())
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            reasoning: choice.message.reasoning_content,
            usage,
            model: api_response.model,
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_openai),
        })
    }
}

#[async_trait]
impl glossa_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = self.complete_uncancelled(request) => result,
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>, ProviderError> {
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, tools = request.tools.len(), "Sending streaming request");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.post(&body, true) => response?,
        };

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and decode events
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(provider = %provider_name, "Stream cancelled");
                        return;
                    }
                    next = byte_stream.next() => next,
                };

                let events = match next {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => {
                        // Dropping the sender reports the stream as interrupted.
                        warn!(provider = %provider_name, error = %e, "Stream transport failed");
                        return;
                    }
                    None => decoder.finish(),
                };

                for event in events {
                    if tx.send(event).await.is_err() {
                        return; // receiver dropped
                    }
                }

                if decoder.is_finished() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}

// --- SSE decoding ---

/// Incremental decoder from SSE bytes to [`StreamEvent`]s.
///
/// Lines are split on raw bytes so multi-byte characters broken across
/// network chunks are reassembled before decoding. Tool calls arrive one
/// index after another; a call is completed as soon as a delta for another
/// index shows up, so consumers never see two calls open at once.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    saw_tool_calls: bool,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes; returns the events completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line);
            self.decode_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }

        events
    }

    /// Flush at end of input. A stream without a finish reason yields
    /// nothing terminal, and the consumer reports it as interrupted.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.decode_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }
        self.finished = true;
        events
    }

    fn decode_line(&mut self, line: &str, out: &mut Vec<StreamEvent>) {
        if self.finished || line.is_empty() || line.starts_with(':') {
            return;
        }

        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();

        // "[DONE]" signals end of stream
        if data == "[DONE]" {
            let reason = if !self.saw_tool_calls {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            };
            self.finish_step(reason, out);
            return;
        }

        match serde_json::from_str::<StreamResponse>(data) {
            Ok(chunk) => self.decode_chunk(chunk, out),
            Err(e) => {
                trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            }
        }
    }

    fn decode_chunk(&mut self, chunk: StreamResponse, out: &mut Vec<StreamEvent>) {
        if let Some(error) = chunk.error {
            out.push(StreamEvent::Error {
                message: error.message,
            });
            self.finished = true;
            return;
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };
        let delta = choice.delta;

        if let Some(text) = delta.reasoning_content.filter(|t| !t.is_empty()) {
            out.push(StreamEvent::ReasoningDelta { text });
        }

        if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
            out.push(StreamEvent::TextDelta { text });
        }

        for tc_delta in delta.tool_calls.unwrap_or_default() {
            self.saw_tool_calls = true;
            if !self.complete_calls(Some(tc_delta.index), out) {
                return;
            }
            let acc = self.tool_calls.entry(tc_delta.index).or_default();

            if let Some(id) = tc_delta.id.filter(|id| !id.is_empty()) {
                acc.id = id;
            }
            let mut fragment = String::new();
            if let Some(func) = tc_delta.function {
                if let Some(name) = func.name.filter(|n| !n.is_empty()) {
                    acc.name = name;
                }
                if let Some(args) = func.arguments {
                    fragment = args;
                }
            }
            acc.arguments.push_str(&fragment);

            if !acc.started && !acc.id.is_empty() && !acc.name.is_empty() {
                acc.start(out);
            } else if acc.started && !fragment.is_empty() {
                out.push(StreamEvent::ToolInputDelta {
                    id: acc.id.clone(),
                    delta: fragment,
                });
            }
        }

        if let Some(reason) = choice.finish_reason {
            self.finish_step(FinishReason::from_openai(&reason), out);
        }
    }

    /// Finalize accumulated tool calls and close the step.
    fn finish_step(&mut self, reason: FinishReason, out: &mut Vec<StreamEvent>) {
        if self.complete_calls(None, out) {
            out.push(StreamEvent::FinishStep {
                finish_reason: reason,
            });
        }
        self.finished = true;
    }

    /// Emit `ToolCall` for every open call except `keep`.
    ///
    /// Returns false once an error event has ended the stream.
    fn complete_calls(&mut self, keep: Option<u32>, out: &mut Vec<StreamEvent>) -> bool {
        let done: Vec<u32> = self
            .tool_calls
            .keys()
            .copied()
            .filter(|index| Some(*index) != keep)
            .collect();

        for index in done {
            let Some(acc) = self.tool_calls.remove(&index) else {
                continue;
            };
            if let Err(event) = acc.complete(out) {
                out.push(event);
                self.finished = true;
                return false;
            }
        }
        true
    }
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
    started: bool,
}

impl ToolCallAccumulator {
    /// Push the completed call, or return the error event for bad input.
    fn complete(mut self, out: &mut Vec<StreamEvent>) -> Result<(), StreamEvent> {
        if self.id.is_empty() {
            self.id = format!("call_{}", uuid::Uuid::new_v4().simple());
        }
        if !self.started {
            self.start(out);
        }

        let raw = if self.arguments.trim().is_empty() {
            "{}"
        } else {
            self.arguments.as_str()
        };
        match serde_json::from_str(raw) {
            Ok(input) => {
                out.push(StreamEvent::ToolCall {
                    id: self.id,
                    tool_name: self.name,
                    input,
                });
                Ok(())
            }
            Err(e) => Err(StreamEvent::Error {
                message: format!("Tool call '{}' has invalid JSON input: {e}", self.name),
            }),
        }
    }

    fn start(&mut self, out: &mut Vec<StreamEvent>) {
        self.started = true;
        out.push(StreamEvent::ToolInputStart {
            id: self.id.clone(),
            tool_name: self.name.clone(),
        });
        if !self.arguments.is_empty() {
            out.push(StreamEvent::ToolInputDelta {
                id: self.id.clone(),
                delta: self.arguments.clone(),
            });
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta. Arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
