//! Workflow controller for Glossa.
//!
//! The [`Agent`] owns the conversation: it streams model turns into the
//! context store, runs the tools the model asks for, and suspends those
//! tools while a human reviews their output.
//!
//! ```text
//! submit(text)
//!   └─ loop: run_turn ─ stream events ─▶ context store
//!                 └─ tool call ─▶ tool executor ─▶ decision gate ◀─ approve / reject
//! ```
//!
//! Every piece of state is observable through `watch` channels so a UI can
//! render it while the workflow runs.

pub mod approval;
pub mod context;
pub mod controller;
pub mod prompt;
mod scope;
mod stream_handler;
mod tool_executor;

#[cfg(test)]
mod test_helpers;

pub use approval::{DecisionGate, DecisionTicket};
pub use context::{ContextStore, MemoryStore, MessageLog};
pub use controller::{Agent, AgentOptions, WorkflowOutcome};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
