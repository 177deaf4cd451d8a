//! Turns one streamed model response into context messages.
//!
//! Deltas are folded into the log as they arrive so the UI can render a
//! response while it streams:
//!
//! - reasoning and text deltas extend the message they started, or start a
//!   new one when the log has moved on
//! - tool input fragments are concatenated into a `Partial` input
//! - a completed tool call replaces its partial message and is executed
//!   before the next event is read
//!
//! Only the last message is ever patched. A provider that opens a second
//! tool call before finishing the first fails the turn.

use crate::context::{is_reasoning_message, is_text_message, is_tool_call_message};
use crate::scope::Scope;
use crate::tool_executor;
use glossa_core::agent::WorkflowState;
use glossa_core::error::{ContextError, Error, ProviderError, Result};
use glossa_core::message::{
    AssistantContent, ContextMessage, MessageBody, ToolCallPart, ToolInput,
};
use glossa_core::provider::{FinishReason, ProviderRequest, StreamEvent};
use glossa_core::tool::ToolCall;
use tracing::{debug, error};

/// Run one model turn and return why the model stopped.
pub(crate) async fn run_turn(scope: &Scope<'_>) -> Result<FinishReason> {
    let agent = scope.agent();
    let cancel = scope.cancel_token().clone();

    scope.set_state(WorkflowState::LlmResponsePending);

    let request = ProviderRequest {
        model: agent.options.reasoning_model.clone(),
        system: Some(agent.options.system_prompt.clone()),
        messages: agent.context.to_model_messages(),
        temperature: agent.options.temperature,
        max_tokens: agent.options.max_tokens,
        tools: agent.tools.definitions(),
        json_mode: false,
    };
    debug!(
        model = %request.model,
        messages = request.messages.len(),
        tools = request.tools.len(),
        "Requesting model turn"
    );

    let mut events = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        stream = agent.provider.stream(request, cancel.clone()) => stream?,
    };

    let mut turn = TurnState::default();

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            event = events.recv() => event,
        };

        let Some(event) = event else {
            return Err(ProviderError::StreamInterrupted(
                "stream closed before the step finished".into(),
            )
            .into());
        };

        if !turn.received {
            turn.received = true;
            scope.set_state(WorkflowState::LlmResponseReceived);
        }

        match event {
            StreamEvent::ReasoningDelta { text } => {
                turn.stream_into(scope, &text, is_reasoning_message, |text| {
                    AssistantContent::Reasoning { text }
                })?;
            }
            StreamEvent::TextDelta { text } => {
                turn.stream_into(scope, &text, is_text_message, |text| {
                    AssistantContent::Text { text }
                })?;
            }
            StreamEvent::ToolInputStart { id, tool_name } => {
                turn.tool_input_start(scope, id, tool_name)?;
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                turn.tool_input_delta(scope, &id, &delta)?;
            }
            StreamEvent::ToolCall {
                id,
                tool_name,
                input,
            } => {
                turn.tool_call(scope, &id, &tool_name, input.clone())?;
                tool_executor::execute(
                    scope,
                    ToolCall {
                        id,
                        name: tool_name,
                        arguments: input,
                    },
                )
                .await?;
            }
            StreamEvent::Error { message } => {
                error!(error = %message, "Model stream reported an error");
                scope.set_state(WorkflowState::Error);
                return Err(ProviderError::Stream(message).into());
            }
            StreamEvent::FinishStep { finish_reason } => {
                debug!(?finish_reason, "Model turn finished");
                return Ok(finish_reason);
            }
        }
    }
}

/// The tool call whose input is still streaming.
struct OpenCall {
    message: ContextMessage,
    call_id: String,
    tool_name: String,
    raw: String,
}

#[derive(Default)]
struct TurnState {
    received: bool,
    /// Text of the reasoning or text message this turn is extending
    buffer: String,
    active_id: Option<String>,
    /// At most one call streams at a time, and it is always the last message
    open_call: Option<OpenCall>,
}

impl TurnState {
    fn stream_into(
        &mut self,
        scope: &Scope<'_>,
        delta: &str,
        is_kind: fn(&ContextMessage) -> bool,
        content: fn(String) -> AssistantContent,
    ) -> std::result::Result<(), ContextError> {
        match scope.last_message() {
            Some(last) if is_kind(&last) && self.active_id.as_deref() == Some(last.id.as_str()) => {
                self.buffer.push_str(delta);
                scope.update_last_message(last.with_body(MessageBody::Assistant {
                    content: content(self.buffer.clone()),
                }))
            }
            _ => {
                self.buffer = delta.to_string();
                let message = ContextMessage::new(MessageBody::Assistant {
                    content: content(self.buffer.clone()),
                });
                self.active_id = Some(message.id.clone());
                scope.add_message(message);
                Ok(())
            }
        }
    }

    fn tool_input_start(&mut self, scope: &Scope<'_>, id: String, tool_name: String) -> Result<()> {
        if let Some(open) = &self.open_call {
            return Err(ProviderError::Stream(format!(
                "tool call '{id}' started before '{}' was complete",
                open.call_id
            ))
            .into());
        }

        self.buffer.clear();
        let message = ContextMessage::tool_call(&id, &tool_name, ToolInput::Partial(String::new()));
        self.active_id = Some(message.id.clone());
        scope.add_message(message.clone());
        self.open_call = Some(OpenCall {
            message,
            call_id: id,
            tool_name,
            raw: String::new(),
        });
        Ok(())
    }

    fn tool_input_delta(
        &mut self,
        scope: &Scope<'_>,
        id: &str,
        delta: &str,
    ) -> std::result::Result<(), ContextError> {
        let Some(open) = self
            .open_call
            .as_mut()
            .filter(|open| is_last(scope, &open.message))
        else {
            error!(call_id = %id, "Tool input fragment without a tool call message, ignoring");
            return Ok(());
        };

        open.raw.push_str(delta);
        scope.update_last_message(open.message.with_body(tool_call_body(
            open.call_id.clone(),
            open.tool_name.clone(),
            ToolInput::Partial(open.raw.clone()),
        )))
    }

    fn tool_call(
        &mut self,
        scope: &Scope<'_>,
        id: &str,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Result<()> {
        self.buffer.clear();
        self.active_id = None;

        let body = tool_call_body(id.to_string(), tool_name.to_string(), ToolInput::Complete(input));
        match self.open_call.take() {
            None => {
                scope.add_message(ContextMessage::new(body));
                Ok(())
            }
            Some(open) if open.call_id == id && is_last(scope, &open.message) => {
                scope.update_last_message(open.message.with_body(body))?;
                Ok(())
            }
            Some(open) if open.call_id != id => Err(ProviderError::Stream(format!(
                "tool call '{id}' completed while '{}' was still streaming",
                open.call_id
            ))
            .into()),
            Some(open) => Err(ProviderError::Stream(format!(
                "tool call '{}' was interrupted by other output",
                open.call_id
            ))
            .into()),
        }
    }
}

fn is_last(scope: &Scope<'_>, message: &ContextMessage) -> bool {
    scope
        .last_message()
        .is_some_and(|last| last.id == message.id && is_tool_call_message(&last))
}

fn tool_call_body(tool_call_id: String, tool_name: String, input: ToolInput) -> MessageBody {
    MessageBody::Assistant {
        content: AssistantContent::ToolCalls {
            calls: vec![ToolCallPart {
                tool_call_id,
                tool_name,
                input,
            }],
        },
    }
}
