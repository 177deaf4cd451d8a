//! Working memory — the structured state of one translation task.
//!
//! Tools read a snapshot through [`crate::AgentHandle::working_memory`] and
//! write through `update_working_memory`; the controller publishes every
//! committed version to observers.

use serde::{Deserialize, Serialize};

/// Per-task state shared between the controller and tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemory {
    /// The text the user asked to translate
    pub original_text: String,

    /// Segments produced by the split tool
    pub split_texts: Vec<String>,

    /// Index of the last approved segment, -1 before the first
    pub current_translation_index: i64,

    /// One entry per approved segment
    pub translation_results: Vec<TranslationResult>,

    /// Set once the workflow finishes successfully
    pub is_complete: bool,

    /// Rejection history of the segment under review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_review: Option<SegmentReview>,
}

/// Outcome of translating one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub original: String,
    pub translated: String,
    pub approved: bool,
    pub rejection_count: u32,
}

/// Review state of the segment awaiting approval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentReview {
    pub original: String,
    pub rejected: Vec<RejectedCandidate>,
}

/// A candidate the reviewer turned down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub translated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new("")
    }
}

impl WorkingMemory {
    pub fn new(original_text: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            split_texts: Vec::new(),
            current_translation_index: -1,
            translation_results: Vec::new(),
            is_complete: false,
            in_review: None,
        }
    }

    /// Open the review of `original`, discarding any earlier history.
    pub fn begin_review(&mut self, original: impl Into<String>) {
        self.in_review = Some(SegmentReview {
            original: original.into(),
            rejected: Vec::new(),
        });
    }

    /// Candidates rejected so far for the segment under review.
    pub fn rejected_candidates(&self) -> &[RejectedCandidate] {
        self.in_review
            .as_ref()
            .map(|r| r.rejected.as_slice())
            .unwrap_or_default()
    }

    /// Record a rejected candidate for the segment under review.
    pub fn record_rejection(&mut self, translated: impl Into<String>, reason: Option<String>) {
        if let Some(review) = self.in_review.as_mut() {
            review.rejected.push(RejectedCandidate {
                translated: translated.into(),
                reason,
            });
        }
    }

    /// Commit the approved candidate: push its result, advance the index
    /// and close the review.
    pub fn record_approval(&mut self, translated: impl Into<String>) {
        let Some(review) = self.in_review.take() else {
            return;
        };
        self.translation_results.push(TranslationResult {
            original: review.original,
            translated: translated.into(),
            approved: true,
            rejection_count: review.rejected.len() as u32,
        });
        self.current_translation_index += 1;
    }

    /// Results stay aligned with the translation index.
    pub fn is_consistent(&self) -> bool {
        self.translation_results.len() as i64 == self.current_translation_index + 1
    }

    /// Approved translations joined in segment order.
    pub fn assembled_translation(&self) -> String {
        self.translation_results
            .iter()
            .filter(|r| r.approved)
            .map(|r| r.translated.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
