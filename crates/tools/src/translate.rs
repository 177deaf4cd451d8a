//! Translate tool — translates one segment under human review.
//!
//! Each candidate is held until the reviewer decides. A rejected candidate
//! (with the reviewer's reason, if any) is fed back into the next attempt's
//! system prompt as a negative exemplar, and the loop repeats until a
//! candidate is approved or the rejection limit is reached.

use async_trait::async_trait;
use glossa_core::error::ToolError;
use glossa_core::memory::{RejectedCandidate, WorkingMemory};
use glossa_core::tool::{AgentHandle, Tool, ToolCall};
use serde::Deserialize;
use std::fmt::Write;
use tracing::{debug, info};

const DESCRIPTION: &str = "Translate one segment produced by 'split'. A human reviewer approves or \
rejects every translation; this tool only returns once a translation is approved. \
Call it once per segment, in order.";

pub struct TranslateTool {
    target_language: String,
    max_rejections: Option<u32>,
}

#[derive(Deserialize)]
struct TranslateInput {
    src_string: String,
}

impl TranslateTool {
    pub fn new(target_language: impl Into<String>, max_rejections: Option<u32>) -> Self {
        Self {
            target_language: target_language.into(),
            max_rejections,
        }
    }

    /// System prompt for one attempt, listing earlier rejections of `sentence`.
    fn system_prompt(&self, sentence: &str, rejected: &[RejectedCandidate]) -> String {
        let mut prompt = format!(
            "You translate text from any language into {lang} only.

Rules:
- Do NOT summarize, interpret, or expand. Translation only.
- Preserve proper nouns, technical terms, symbols, and formatting (including line breaks) exactly as in the source.
- Leave code snippets (inline code, fenced blocks, any programming syntax) untranslated.
- Output only the translated text, without commentary or explanation.",
            lang = self.target_language
        );

        if !rejected.is_empty() {
            let _ = write!(
                prompt,
                "\n\n### <original-sentence>{sentence}</original-sentence> had translation issues.\n\
                 Human reviewers rejected these translations:\n"
            );
            for candidate in rejected {
                let _ = write!(
                    prompt,
                    "- <rejected-translated>{}</rejected-translated>",
                    candidate.translated
                );
                if let Some(reason) = &candidate.reason {
                    let _ = write!(prompt, " (reviewer: {reason})");
                }
                prompt.push('\n');
            }
            prompt.push_str("Avoid similar mistakes.");
        }

        prompt
    }
}

#[async_trait]
impl Tool for TranslateTool {
    fn name(&self) -> &str {
        "translate"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "src_string": {
                    "type": "string",
                    "description": "The segment to translate, exactly as returned by 'split'"
                }
            },
            "required": ["src_string"]
        })
    }

    fn renderer(&self) -> Option<&str> {
        Some("translate")
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        handle: &dyn AgentHandle,
        call: &ToolCall,
    ) -> Result<serde_json::Value, ToolError> {
        let TranslateInput { src_string: sentence } = serde_json::from_value(input).map_err(|e| {
            ToolError::InvalidArguments(format!("translate expects {{\"src_string\": string}}: {e}"))
        })?;

        let mut begin = |memory: &mut WorkingMemory| memory.begin_review(sentence.clone());
        handle.update_working_memory(&mut begin);

        let mut rejected: Vec<RejectedCandidate> = Vec::new();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let system = self.system_prompt(&sentence, &rejected);
            let translated = handle
                .generate_text(&system, &format!("translate this sentence: {sentence}"))
                .await?
                .trim()
                .to_string();

            debug!(call_id = %call.id, attempt = attempts, "Awaiting review");

            let decision = handle
                .wait_for_decision(serde_json::json!({
                    "sentence": sentence,
                    "translated": translated,
                    "attempt": attempts,
                    "rejections": rejected,
                }))
                .await?;

            if decision.is_approved() {
                let mut approve = |memory: &mut WorkingMemory| {
                    memory.record_approval(translated.clone());
                };
                handle.update_working_memory(&mut approve);
                info!(attempts, rejections = rejected.len(), "Segment approved");

                return Ok(serde_json::json!({
                    "translated_string": translated,
                    "meta": {
                        "rejections": rejected,
                        "attempts": attempts,
                    },
                }));
            }

            let mut reject = |memory: &mut WorkingMemory| {
                memory.record_rejection(translated.clone(), decision.reason.clone());
            };
            handle.update_working_memory(&mut reject);
            rejected.push(RejectedCandidate {
                translated,
                reason: decision.reason,
            });
            debug!(rejections = rejected.len(), "Segment rejected");

            if let Some(max) = self.max_rejections {
                if rejected.len() as u32 >= max {
                    return Err(ToolError::ReviewExhausted {
                        segment: sentence,
                        rejections: rejected.len() as u32,
                    });
                }
            }
        }
    }
}
