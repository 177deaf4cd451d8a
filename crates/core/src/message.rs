//! Message domain types.
//!
//! Two shapes live here:
//! - [`ContextMessage`]: an entry of the conversation log the UI renders. It
//!   carries reasoning blocks, partially streamed tool input and tool audit
//!   status, none of which the model ever sees directly.
//! - [`ModelMessage`]: the provider-facing projection of that log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Unique message ID, never reused
    pub id: String,

    /// Creation time
    pub timestamp: DateTime<Utc>,

    /// What the message carries
    #[serde(flatten)]
    pub body: MessageBody,
}

/// The typed payload of a [`ContextMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: AssistantContent,
    },
    Tool {
        status: ToolStatus,
        results: Vec<ToolResultPart>,
    },
}

/// Content of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssistantContent {
    /// Plain text, replayed to the model.
    Text { text: String },

    /// A reasoning block. UI-only, never replayed.
    Reasoning { text: String },

    /// An ordered list of tool calls.
    ToolCalls { calls: Vec<ToolCallPart> },
}

/// One tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: ToolInput,
}

/// Tool call input: raw text while streaming, structured once the provider
/// declares the call complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ToolInput {
    Partial(String),
    Complete(serde_json::Value),
}

impl ToolInput {
    /// The input as it should be sent back to the model.
    pub fn to_arguments(&self) -> String {
        match self {
            ToolInput::Partial(raw) => raw.clone(),
            ToolInput::Complete(value) => value.to_string(),
        }
    }
}

/// Audit status of a tool message.
///
/// Starts `Pending` and moves once to `Approved` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Approved,
    Rejected,
}

/// The result of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: serde_json::Value,

    /// UI renderer hint registered alongside the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
}

impl ContextMessage {
    /// Wrap a body with a fresh id and timestamp.
    pub fn new(body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            body,
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageBody::System {
            content: content.into(),
        })
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageBody::User {
            content: content.into(),
        })
    }

    /// Create an assistant plain-text message.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(MessageBody::Assistant {
            content: AssistantContent::Text { text: text.into() },
        })
    }

    /// Create an assistant reasoning message.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::new(MessageBody::Assistant {
            content: AssistantContent::Reasoning { text: text.into() },
        })
    }

    /// Create an assistant message holding a single tool call.
    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: ToolInput,
    ) -> Self {
        Self::new(MessageBody::Assistant {
            content: AssistantContent::ToolCalls {
                calls: vec![ToolCallPart {
                    tool_call_id: tool_call_id.into(),
                    tool_name: tool_name.into(),
                    input,
                }],
            },
        })
    }

    /// Create a tool message with a single result.
    pub fn tool_result(status: ToolStatus, result: ToolResultPart) -> Self {
        Self::new(MessageBody::Tool {
            status,
            results: vec![result],
        })
    }

    /// Copy of this message with a different body but the same identity.
    pub fn with_body(&self, body: MessageBody) -> Self {
        Self {
            id: self.id.clone(),
            timestamp: self.timestamp,
            body,
        }
    }

    /// The tool status, if this is a tool message.
    pub fn tool_status(&self) -> Option<ToolStatus> {
        match &self.body {
            MessageBody::Tool { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ── Provider-facing messages ──────────────────────────────────────────────

/// The role of a message sender, as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// A message as sent to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ModelMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// An assistant message that only carries tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<MessageToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, "")
        }
    }

    /// A tool result message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// A tool call embedded in an assistant model message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}
