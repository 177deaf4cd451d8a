//! Runs one model-requested tool call and records its result.

use crate::scope::Scope;
use glossa_config::UnknownToolPolicy;
use glossa_core::agent::WorkflowState;
use glossa_core::error::{Result, ToolError};
use glossa_core::message::{
    AssistantContent, ContextMessage, MessageBody, ToolResultPart, ToolStatus,
};
use glossa_core::tool::ToolCall;
use std::time::Instant;
use tracing::{error, info, warn};

/// Execute `call` against the agent's registry.
///
/// A pending tool message is appended first and settled in place once the
/// tool finishes: `approved` with its output, or `rejected` with the error.
/// A cancelled tool leaves its message pending.
pub(crate) async fn execute(scope: &Scope<'_>, call: ToolCall) -> Result<()> {
    let agent = scope.agent();

    let Some(tool) = agent.tools.get(&call.name) else {
        return match agent.options.unknown_tool {
            UnknownToolPolicy::Ignore => {
                warn!(tool = %call.name, call_id = %call.id, "Model called an unknown tool, ignoring");
                // A call without a result must not be replayed, so drop it
                if let Some(message) = scope.last_message().filter(|m| requests_call(m, &call.id)) {
                    scope.delete_message(&message.id)?;
                }
                Ok(())
            }
            UnknownToolPolicy::Error => {
                error!(tool = %call.name, call_id = %call.id, "Model called an unknown tool");
                Err(ToolError::NotFound(call.name).into())
            }
        };
    };

    let result_part = ToolResultPart {
        tool_call_id: call.id.clone(),
        tool_name: call.name.clone(),
        output: serde_json::Value::Null,
        renderer: tool.renderer().map(String::from),
    };
    let pending = ContextMessage::tool_result(ToolStatus::Pending, result_part.clone());
    scope.add_message(pending.clone());
    scope.set_state(WorkflowState::ToolExecuting);

    info!(tool = %call.name, call_id = %call.id, "Executing tool");
    let start = Instant::now();
    let cancel = scope.cancel_token().clone();

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ToolError::Cancelled),
        result = tool.execute(call.arguments.clone(), scope, &call) => result,
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    let settle = |status: ToolStatus, output: serde_json::Value| {
        pending.with_body(MessageBody::Tool {
            status,
            results: vec![ToolResultPart {
                output,
                ..result_part.clone()
            }],
        })
    };

    match result {
        Ok(output) => {
            scope.replace_message(&pending.id, settle(ToolStatus::Approved, output))?;
            scope.set_state(WorkflowState::ToolResult);
            info!(tool = %call.name, duration_ms, "Tool completed");
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            info!(tool = %call.name, duration_ms, "Tool cancelled");
            Err(e.into())
        }
        Err(e) => {
            warn!(tool = %call.name, duration_ms, error = %e, "Tool failed");
            scope.replace_message(
                &pending.id,
                settle(
                    ToolStatus::Rejected,
                    serde_json::json!({ "error": e.to_string() }),
                ),
            )?;
            Err(e.into())
        }
    }
}

fn requests_call(message: &ContextMessage, call_id: &str) -> bool {
    match &message.body {
        MessageBody::Assistant {
            content: AssistantContent::ToolCalls { calls },
        } => calls.iter().any(|c| c.tool_call_id == call_id),
        _ => false,
    }
}
