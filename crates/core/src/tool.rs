//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what the model calls to move the translation forward. A tool
//! runs inside the workflow with an [`AgentHandle`], through which it reads
//! and writes working memory, asks the reviewer for a decision, and makes
//! nested model calls.

use crate::agent::{Decision, PendingDecision};
use crate::error::ToolError;
use crate::memory::WorkingMemory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// What a running tool may ask of the workflow controller.
///
/// Every write through a handle is scoped to the conversation it was issued
/// for; once that conversation is cleared, writes are silently dropped and
/// waits fail as cancelled.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    /// Snapshot of the current working memory.
    fn working_memory(&self) -> Arc<WorkingMemory>;

    /// Apply `update` to working memory and publish the result.
    fn update_working_memory(&self, update: &mut (dyn FnMut(&mut WorkingMemory) + Send));

    /// Suspend until the reviewer approves or rejects `payload`.
    async fn wait_for_decision(&self, payload: serde_json::Value) -> Result<Decision, ToolError>;

    /// The decision currently awaited, if any.
    fn pending_decision(&self) -> Option<PendingDecision>;

    /// One-shot text generation with the tool model.
    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, ToolError>;

    /// One-shot generation constrained to a JSON reply.
    async fn generate_json(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<serde_json::Value, ToolError>;

    /// Token cancelled when the conversation is stopped or cleared.
    fn cancellation(&self) -> CancellationToken;
}

/// The core Tool trait.
///
/// Each tool (split, translate) implements this trait. Tools are registered
/// in the ToolRegistry and made available to the workflow loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "split", "translate").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// UI renderer hint attached to this tool's results.
    fn renderer(&self) -> Option<&str> {
        None
    }

    /// Execute the tool with the given input.
    async fn execute(
        &self,
        input: serde_json::Value,
        handle: &dyn AgentHandle,
        call: &ToolCall,
    ) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The workflow uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up tools when the LLM requests them
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
