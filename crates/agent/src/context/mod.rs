//! Conversation state owned by the agent.
//!
//! | Store | Holds | Published as |
//! |-------|-------|--------------|
//! | [`ContextStore`] | The message log the UI renders | `Arc<Vec<ContextMessage>>` |
//! | [`MemoryStore`] | Structured task state | `Arc<WorkingMemory>` |

pub mod store;
pub mod working_memory;

pub use store::{
    ContextStore, MessageLog, is_reasoning_message, is_text_message, is_tool_call_message,
};
pub use working_memory::MemoryStore;
