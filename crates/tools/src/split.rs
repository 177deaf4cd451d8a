//! Split tool — segments text at natural-language boundaries.
//!
//! The tool model only reports boundary positions; the text itself is sliced
//! locally so segments are byte-for-byte faithful to the original.

use async_trait::async_trait;
use glossa_core::error::ToolError;
use glossa_core::tool::{AgentHandle, Tool, ToolCall};
use serde::Deserialize;
use tracing::debug;

const DESCRIPTION: &str = "Find natural-language segment boundaries in a text and split it into segments. \
Call this first with the full original text.";

const SYSTEM_PROMPT: &str = "You find natural-language segment boundaries in a text.

Rules:
- Do not rewrite, normalize, or remove any characters from the text.
- Only detect segment boundaries, typically at the end of a sentence or paragraph.
- Report the end index (exclusive) of each segment, counted in characters.
- Indices must match positions in the original text exactly. Count every character, including spaces, tabs, line breaks and punctuation.
- Keep the order in which segments appear.

Reply with a JSON object of the form {\"indices\": [12, 40, 57]}.";

pub struct SplitTool;

#[derive(Deserialize)]
struct SplitInput {
    text: String,
}

#[async_trait]
impl Tool for SplitTool {
    fn name(&self) -> &str {
        "split"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The original text to split"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        handle: &dyn AgentHandle,
        _call: &ToolCall,
    ) -> Result<serde_json::Value, ToolError> {
        let SplitInput { text } = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidArguments(format!("split expects {{\"text\": string}}: {e}")))?;

        if text.trim().is_empty() {
            return Err(ToolError::InvalidArguments("Nothing to split".into()));
        }

        let reply = handle
            .generate_json(SYSTEM_PROMPT, &format!("split:{text}"))
            .await?;
        let indices = parse_indices(&reply)?;
        let segments = split_by_indices(&text, &indices);

        debug!(indices = ?indices, segments = segments.len(), "Split text");

        let mut update = |memory: &mut glossa_core::WorkingMemory| {
            memory.split_texts = segments.clone();
        };
        handle.update_working_memory(&mut update);

        Ok(serde_json::json!(segments))
    }
}

/// Read end indices from a model reply: a bare array, or an object holding
/// an `indices` or `elements` array.
fn parse_indices(reply: &serde_json::Value) -> Result<Vec<usize>, ToolError> {
    let array = reply
        .as_array()
        .or_else(|| reply.get("indices").and_then(|v| v.as_array()))
        .or_else(|| reply.get("elements").and_then(|v| v.as_array()))
        .ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: "split".into(),
            reason: format!("model reply has no index array: {reply}"),
        })?;

    Ok(array
        .iter()
        .filter_map(|v| {
            v.as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        })
        .map(|i| i as usize)
        .collect())
}

/// Slice `text` at exclusive character end indices.
///
/// Indices past the end are clamped, non-increasing ones skipped, and the
/// remainder after the last index becomes a final segment. Whitespace-only
/// segments are dropped.
pub fn split_by_indices(text: &str, indices: &[usize]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut segments = Vec::new();
    let mut start = 0;

    for &end in indices {
        let end = end.min(len);
        if end <= start {
            continue;
        }
        segments.push(chars[start..end].iter().collect::<String>());
        start = end;
    }

    if start < len {
        segments.push(chars[start..].iter().collect());
    }

    segments.retain(|s| !s.trim().is_empty());
    segments
}
