//! Workflow state and human decision types.

use serde::{Deserialize, Serialize};

/// Where the controller currently is in a translation workflow.
///
/// Published to observers on every transition; the UI drives its spinners
/// and approval prompts from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    UserInput,
    LlmResponsePending,
    LlmResponseReceived,
    ToolExecuting,
    ToolResult,
    ToolAuditPending,
    ToolAuditApproved,
    ToolAuditRejected,
    WorkflowComplete,
    Error,
    Abort,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::UserInput => "user_input",
            Self::LlmResponsePending => "llm_response_pending",
            Self::LlmResponseReceived => "llm_response_received",
            Self::ToolExecuting => "tool_executing",
            Self::ToolResult => "tool_result",
            Self::ToolAuditPending => "tool_audit_pending",
            Self::ToolAuditApproved => "tool_audit_approved",
            Self::ToolAuditRejected => "tool_audit_rejected",
            Self::WorkflowComplete => "workflow_complete",
            Self::Error => "error",
            Self::Abort => "abort",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Approved,
    Rejected,
}

/// The resolution of a pending decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub status: DecisionStatus,

    /// Free-form feedback; only meaningful on rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Decision {
    pub fn approved() -> Self {
        Self {
            status: DecisionStatus::Approved,
            reason: None,
        }
    }

    /// A rejection. Blank reasons are treated as absent.
    pub fn rejected(reason: Option<String>) -> Self {
        Self {
            status: DecisionStatus::Rejected,
            reason: reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == DecisionStatus::Approved
    }
}

/// A decision the workflow is blocked on, as shown to the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    /// Unique per wait
    pub id: String,

    /// Conversation generation the wait belongs to
    pub generation: u64,

    /// What the tool wants reviewed (e.g. sentence and candidate translation)
    pub payload: serde_json::Value,
}
