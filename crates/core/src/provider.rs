//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a stream of [`StreamEvent`]s that
//! the agent folds into its context log one event at a time.
//!
//! Every call takes the conversation's [`CancellationToken`]; a cancelled
//! token must stop the request at its next suspension point.

use crate::error::ProviderError;
use crate::message::ModelMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "deepseek-reasoner", "gpt-4o")
    pub model: String,

    /// System prompt, sent ahead of `messages`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The conversation messages
    pub messages: Vec<ModelMessage>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Ask the backend for a JSON object reply
    #[serde(default)]
    pub json_mode: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// A single-prompt request with a system instruction.
    pub fn prompt(
        model: impl Into<String>,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system: Some(system.into()),
            messages: vec![ModelMessage::user(prompt)],
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
            json_mode: false,
        }
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: ModelMessage,

    /// Reasoning text, for models that expose it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the model ended a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    Other,
}

impl FinishReason {
    /// Map an OpenAI-style `finish_reason` string.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }

    /// Whether the model expects another turn (it asked for tools).
    pub fn wants_another_turn(self) -> bool {
        matches!(self, Self::ToolCalls)
    }
}

/// One event of a streamed model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// A fragment of reasoning text.
    ReasoningDelta { text: String },

    /// A fragment of assistant text.
    TextDelta { text: String },

    /// The model started a tool call; its input follows as deltas.
    ToolInputStart { id: String, tool_name: String },

    /// A raw fragment of tool call input.
    ToolInputDelta { id: String, delta: String },

    /// The tool call is complete and `input` is its parsed payload.
    ToolCall {
        id: String,
        tool_name: String,
        input: serde_json::Value,
    },

    /// The provider reported an error mid-stream.
    Error { message: String },

    /// The step finished.
    FinishStep { finish_reason: FinishReason },
}

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The agent calls `stream()` for
/// workflow turns and tools call `complete()` through the agent handle,
/// without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "deepseek", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of turn events.
    ///
    /// Default implementation calls `complete()` and replays the result as
    /// the event sequence a streaming backend would have produced.
    async fn stream(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let response = self.complete(request, cancel).await?;
        let events = replay_events(response);
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            let _ = tx.send(event).await;
        }
        Ok(rx)
    }
}

/// Expand a complete response into stream events.
pub fn replay_events(response: ProviderResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if let Some(reasoning) = response.reasoning.filter(|r| !r.is_empty()) {
        events.push(StreamEvent::ReasoningDelta { text: reasoning });
    }
    if !response.message.content.is_empty() {
        events.push(StreamEvent::TextDelta {
            text: response.message.content.clone(),
        });
    }
    let has_tool_calls = !response.message.tool_calls.is_empty();
    for call in response.message.tool_calls {
        events.push(StreamEvent::ToolInputStart {
            id: call.id.clone(),
            tool_name: call.name.clone(),
        });
        events.push(StreamEvent::ToolInputDelta {
            id: call.id.clone(),
            delta: call.arguments.clone(),
        });
        match serde_json::from_str(&call.arguments) {
            Ok(input) => events.push(StreamEvent::ToolCall {
                id: call.id,
                tool_name: call.name,
                input,
            }),
            Err(e) => {
                events.push(StreamEvent::Error {
                    message: format!("Tool call '{}' has invalid JSON input: {e}", call.name),
                });
                return events;
            }
        }
    }
    let finish_reason = response.finish_reason.unwrap_or(if has_tool_calls {
        FinishReason::ToolCalls
    } else {
        FinishReason::Stop
    });
    events.push(StreamEvent::FinishStep { finish_reason });
    events
}
