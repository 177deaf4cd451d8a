//! Context store — the conversation log shown to the user.
//!
//! The log is published through a `watch` channel as an `Arc<Vec<_>>`.
//! Mutations go through `Arc::make_mut`, so a snapshot a reader already
//! holds is never changed underneath it.

use glossa_core::error::ContextError;
use glossa_core::message::{
    AssistantContent, ContextMessage, MessageBody, MessageToolCall, ModelMessage, ToolStatus,
};
use std::sync::Arc;
use tokio::sync::watch;

pub type MessageLog = Arc<Vec<ContextMessage>>;

pub struct ContextStore {
    tx: watch::Sender<MessageLog>,
}

impl ContextStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        Self { tx }
    }

    /// Apply `f` to the log and publish it on success.
    ///
    /// The log is copied only while a reader still holds the current
    /// snapshot. `f` must fail before it writes anything; on failure the
    /// previous `Arc` is put back and nobody is notified.
    fn apply<R>(
        &self,
        f: impl FnOnce(&mut Vec<ContextMessage>) -> Result<R, ContextError>,
    ) -> Result<R, ContextError> {
        let mut outcome = Err(ContextError::Empty);
        self.tx.send_if_modified(|log| {
            // Readers cannot take new snapshots while the sender is locked
            let previous = (Arc::strong_count(log) > 1).then(|| Arc::clone(log));
            match f(Arc::make_mut(log)) {
                Ok(value) => {
                    outcome = Ok(value);
                    true
                }
                Err(e) => {
                    if let Some(previous) = previous {
                        *log = previous;
                    }
                    outcome = Err(e);
                    false
                }
            }
        });
        outcome
    }

    pub fn add_message(&self, message: ContextMessage) {
        self.tx.send_modify(|log| Arc::make_mut(log).push(message));
    }

    /// Replace the final entry of the log.
    pub fn update_last_message(&self, message: ContextMessage) -> Result<(), ContextError> {
        self.apply(|log| {
            let last = log.last_mut().ok_or(ContextError::Empty)?;
            *last = message;
            Ok(())
        })
    }

    /// Replace the entry with the given id.
    pub fn replace_message(&self, id: &str, message: ContextMessage) -> Result<(), ContextError> {
        self.apply(|log| {
            let slot = log
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| ContextError::NotFound(id.to_string()))?;
            *slot = message;
            Ok(())
        })
    }

    pub fn delete_message(&self, id: &str) -> Result<(), ContextError> {
        self.apply(|log| {
            let index = log
                .iter()
                .position(|m| m.id == id)
                .ok_or_else(|| ContextError::NotFound(id.to_string()))?;
            log.remove(index);
            Ok(())
        })
    }

    pub fn set_messages(&self, messages: Vec<ContextMessage>) {
        self.tx.send_replace(Arc::new(messages));
    }

    pub fn clear(&self) {
        self.set_messages(Vec::new());
    }

    /// Snapshot of the log.
    pub fn messages(&self) -> MessageLog {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MessageLog> {
        self.tx.subscribe()
    }

    pub fn last(&self) -> Option<ContextMessage> {
        self.tx.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Project the log onto what the model is shown.
    ///
    /// Reasoning never leaves the UI. Tool results are replayed only once
    /// approved, one model message per result.
    pub fn to_model_messages(&self) -> Vec<ModelMessage> {
        let log = self.messages();
        let mut out = Vec::with_capacity(log.len());

        for message in log.iter() {
            match &message.body {
                MessageBody::System { content } => out.push(ModelMessage::system(content)),
                MessageBody::User { content } => out.push(ModelMessage::user(content)),
                MessageBody::Assistant { content } => match content {
                    AssistantContent::Text { text } if !text.is_empty() => {
                        out.push(ModelMessage::assistant(text))
                    }
                    AssistantContent::ToolCalls { calls } if !calls.is_empty() => {
                        out.push(ModelMessage::assistant_tool_calls(
                            calls
                                .iter()
                                .map(|call| MessageToolCall {
                                    id: call.tool_call_id.clone(),
                                    name: call.tool_name.clone(),
                                    arguments: call.input.to_arguments(),
                                })
                                .collect(),
                        ))
                    }
                    _ => {}
                },
                MessageBody::Tool {
                    status: ToolStatus::Approved,
                    results,
                } => {
                    for result in results {
                        out.push(ModelMessage::tool_result(
                            &result.tool_call_id,
                            replay_output(&result.output),
                        ));
                    }
                }
                MessageBody::Tool { .. } => {}
            }
        }

        out
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON text of a tool output with bookkeeping keys removed.
fn replay_output(output: &serde_json::Value) -> String {
    match output {
        serde_json::Value::Object(map) => {
            let visible: serde_json::Map<_, _> = map
                .iter()
                .filter(|(key, _)| key.as_str() != "meta" && !key.starts_with('_'))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            serde_json::Value::Object(visible).to_string()
        }
        other => other.to_string(),
    }
}

pub fn is_reasoning_message(message: &ContextMessage) -> bool {
    matches!(
        message.body,
        MessageBody::Assistant {
            content: AssistantContent::Reasoning { .. }
        }
    )
}

pub fn is_tool_call_message(message: &ContextMessage) -> bool {
    matches!(
        message.body,
        MessageBody::Assistant {
            content: AssistantContent::ToolCalls { .. }
        }
    )
}

pub fn is_text_message(message: &ContextMessage) -> bool {
    matches!(
        message.body,
        MessageBody::Assistant {
            content: AssistantContent::Text { .. }
        }
    )
}
