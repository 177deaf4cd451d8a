//! Generation-scoped access to the agent.
//!
//! A [`Scope`] is issued to one workflow run. Its writes land only while
//! the conversation generation it was issued for is still current; after a
//! clear they are dropped, and decision waits fail as cancelled.

use crate::controller::Agent;
use crate::lock;
use async_trait::async_trait;
use glossa_core::agent::{Decision, PendingDecision, WorkflowState};
use glossa_core::error::{ContextError, ProviderError, ToolError};
use glossa_core::memory::WorkingMemory;
use glossa_core::message::ContextMessage;
use glossa_core::provider::ProviderRequest;
use glossa_core::tool::AgentHandle;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

pub(crate) struct Scope<'a> {
    agent: &'a Agent,
    generation: u64,
    cancel: CancellationToken,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(agent: &'a Agent, generation: u64, cancel: CancellationToken) -> Self {
        Self {
            agent,
            generation,
            cancel,
        }
    }

    pub(crate) fn agent(&self) -> &'a Agent {
        self.agent
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `f` only if this scope's generation is still current.
    ///
    /// The generation lock is held while `f` runs, so a concurrent clear
    /// either happens entirely before or entirely after the write.
    fn write<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let current = lock(&self.agent.generation);
        if *current != self.generation {
            trace!(
                scope = self.generation,
                current = *current,
                "Dropping write from a cleared conversation"
            );
            return None;
        }
        Some(f())
    }

    pub(crate) fn set_state(&self, state: WorkflowState) {
        self.write(|| self.agent.publish_state(state));
    }

    pub(crate) fn add_message(&self, message: ContextMessage) {
        self.write(|| self.agent.context.add_message(message));
    }

    pub(crate) fn update_last_message(&self, message: ContextMessage) -> Result<(), ContextError> {
        self.write(|| self.agent.context.update_last_message(message))
            .unwrap_or(Ok(()))
    }

    pub(crate) fn replace_message(
        &self,
        id: &str,
        message: ContextMessage,
    ) -> Result<(), ContextError> {
        self.write(|| self.agent.context.replace_message(id, message))
            .unwrap_or(Ok(()))
    }

    pub(crate) fn delete_message(&self, id: &str) -> Result<(), ContextError> {
        self.write(|| self.agent.context.delete_message(id))
            .unwrap_or(Ok(()))
    }

    pub(crate) fn last_message(&self) -> Option<ContextMessage> {
        self.agent.context.last()
    }

    pub(crate) fn update_memory(&self, f: impl FnOnce(&mut WorkingMemory)) {
        self.write(|| self.agent.memory.update(f));
    }

    pub(crate) fn reset_memory(&self, original_text: &str) {
        self.write(|| self.agent.memory.reset(original_text));
    }

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        json_mode: bool,
    ) -> Result<String, ToolError> {
        let options = &self.agent.options;
        let mut request = ProviderRequest::prompt(&options.tool_model, system, prompt);
        request.temperature = options.temperature;
        request.max_tokens = options.max_tokens;
        request.json_mode = json_mode;

        let response = self
            .agent
            .provider
            .complete(request, self.cancel.clone())
            .await?;
        Ok(response.message.content)
    }
}

/// Parse a JSON reply, tolerating a surrounding Markdown code fence.
fn parse_json_reply(reply: &str) -> Result<serde_json::Value, serde_json::Error> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
}

#[async_trait]
impl<'a> AgentHandle for Scope<'a> {
    fn working_memory(&self) -> Arc<WorkingMemory> {
        self.agent.memory.snapshot()
    }

    fn update_working_memory(&self, update: &mut (dyn FnMut(&mut WorkingMemory) + Send)) {
        self.update_memory(|memory| update(memory));
    }

    async fn wait_for_decision(&self, payload: serde_json::Value) -> Result<Decision, ToolError> {
        let ticket = self
            .write(|| {
                self.agent.publish_state(WorkflowState::ToolAuditPending);
                self.agent.gate.register(self.generation, payload)
            })
            .ok_or(ToolError::Cancelled)?;

        let decision = self.agent.gate.wait(ticket, &self.cancel).await?;

        info!(
            status = ?decision.status,
            reason = decision.reason.as_deref().unwrap_or(""),
            "Reviewer decided"
        );
        self.set_state(if decision.is_approved() {
            WorkflowState::ToolAuditApproved
        } else {
            WorkflowState::ToolAuditRejected
        });
        Ok(decision)
    }

    fn pending_decision(&self) -> Option<PendingDecision> {
        self.agent.gate.pending()
    }

    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, ToolError> {
        self.generate(system, prompt, false).await
    }

    async fn generate_json(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<serde_json::Value, ToolError> {
        let reply = self.generate(system, prompt, true).await?;
        parse_json_reply(&reply).map_err(|e| {
            ToolError::Provider(ProviderError::InvalidResponse(format!(
                "expected a JSON reply: {e}"
            )))
        })
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
