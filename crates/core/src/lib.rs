//! # Glossa Core
//!
//! Domain types, traits, and error definitions for the Glossa translation
//! agent. This crate has **no runtime of its own**: it defines the model that
//! the provider, tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here, and implementations live in their own crates:
//! - `Provider`: an LLM backend able to stream a turn and complete a prompt
//! - `Tool`: a named capability the model can call
//! - `AgentHandle`: what a running tool may ask of the controller
//!
//! All other crates depend inward on core.

pub mod agent;
pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Decision, DecisionStatus, PendingDecision, WorkflowState};
pub use error::{ContextError, Error, ProviderError, Result, ToolError};
pub use memory::{RejectedCandidate, SegmentReview, TranslationResult, WorkingMemory};
pub use message::{
    AssistantContent, ContextMessage, MessageBody, MessageToolCall, ModelMessage, Role, ToolCallPart,
    ToolInput, ToolResultPart, ToolStatus,
};
pub use provider::{
    FinishReason, Provider, ProviderRequest, ProviderResponse, StreamEvent, Usage,
};
pub use tool::{AgentHandle, Tool, ToolCall, ToolDefinition, ToolRegistry};
