//! Scripted agent handle for tool tests.

use async_trait::async_trait;
use glossa_core::error::ToolError;
use glossa_core::tool::AgentHandle;
use glossa_core::{Decision, PendingDecision, WorkingMemory};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Replays canned model replies and reviewer decisions, recording what the
/// tool asked for.
pub struct ScriptedHandle {
    memory: Mutex<WorkingMemory>,
    texts: Mutex<VecDeque<String>>,
    json: Mutex<VecDeque<serde_json::Value>>,
    decisions: Mutex<VecDeque<Decision>>,
    systems: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    payloads: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedHandle {
    pub fn new(original_text: &str) -> Self {
        Self {
            memory: Mutex::new(WorkingMemory::new(original_text)),
            texts: Mutex::new(VecDeque::new()),
            json: Mutex::new(VecDeque::new()),
            decisions: Mutex::new(VecDeque::new()),
            systems: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_texts<I, S>(self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.texts
            .lock()
            .unwrap()
            .extend(texts.into_iter().map(Into::into));
        self
    }

    pub fn with_json(self, reply: serde_json::Value) -> Self {
        self.json.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_decisions(self, decisions: impl IntoIterator<Item = Decision>) -> Self {
        self.decisions.lock().unwrap().extend(decisions);
        self
    }

    pub fn systems(&self) -> Vec<String> {
        self.systems.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.payloads.lock().unwrap().clone()
    }

    fn record(&self, system: &str, prompt: &str) {
        self.systems.lock().unwrap().push(system.to_string());
        self.prompts.lock().unwrap().push(prompt.to_string());
    }
}

#[async_trait]
impl AgentHandle for ScriptedHandle {
    fn working_memory(&self) -> Arc<WorkingMemory> {
        Arc::new(self.memory.lock().unwrap().clone())
    }

    fn update_working_memory(&self, update: &mut (dyn FnMut(&mut WorkingMemory) + Send)) {
        update(&mut self.memory.lock().unwrap());
    }

    async fn wait_for_decision(&self, payload: serde_json::Value) -> Result<Decision, ToolError> {
        self.payloads.lock().unwrap().push(payload);
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ToolError::Cancelled)
    }

    fn pending_decision(&self) -> Option<PendingDecision> {
        None
    }

    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, ToolError> {
        self.record(system, prompt);
        self.texts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: "scripted".into(),
                reason: "no scripted text left".into(),
            })
    }

    async fn generate_json(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<serde_json::Value, ToolError> {
        self.record(system, prompt);
        self.json
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: "scripted".into(),
                reason: "no scripted JSON left".into(),
            })
    }

    fn cancellation(&self) -> CancellationToken {
        CancellationToken::new()
    }
}
