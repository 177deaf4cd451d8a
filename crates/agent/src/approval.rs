//! Decision gate — suspends a tool until the reviewer approves or rejects.
//!
//! A running tool registers a ticket, which publishes a [`PendingDecision`]
//! for the UI, then awaits it. At most one waiter exists at a time: a new
//! registration supersedes the previous waiter, which fails with
//! [`ToolError::DecisionSuperseded`]. Waits never time out; they end on a
//! decision, on cancellation, or when the gate is reset.

use crate::lock;
use glossa_core::agent::{Decision, PendingDecision};
use glossa_core::error::ToolError;
use std::sync::Mutex;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Waiter {
    id: String,
    generation: u64,
    tx: oneshot::Sender<Result<Decision, ToolError>>,
}

/// A registered wait, handed back to [`DecisionGate::wait`].
pub struct DecisionTicket {
    id: String,
    rx: oneshot::Receiver<Result<Decision, ToolError>>,
}

impl DecisionTicket {
    pub fn id(&self) -> &str {
        &self.id
    }
}

pub struct DecisionGate {
    waiter: Mutex<Option<Waiter>>,
    pending: watch::Sender<Option<PendingDecision>>,
}

impl DecisionGate {
    pub fn new() -> Self {
        let (pending, _) = watch::channel(None);
        Self {
            waiter: Mutex::new(None),
            pending,
        }
    }

    /// Install a waiter for `generation` and publish its payload.
    pub fn register(&self, generation: u64, payload: serde_json::Value) -> DecisionTicket {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        let previous = lock(&self.waiter).replace(Waiter {
            id: id.clone(),
            generation,
            tx,
        });
        if let Some(previous) = previous {
            warn!(superseded = %previous.id, "New decision requested while another was pending");
            let _ = previous.tx.send(Err(ToolError::DecisionSuperseded));
        }

        self.pending.send_replace(Some(PendingDecision {
            id: id.clone(),
            generation,
            payload,
        }));
        debug!(decision_id = %id, generation, "Awaiting reviewer decision");

        DecisionTicket { id, rx }
    }

    /// Suspend until the ticket is resolved or `cancel` fires.
    ///
    /// The pending slot is cleared however the wait ends.
    pub async fn wait(
        &self,
        ticket: DecisionTicket,
        cancel: &CancellationToken,
    ) -> Result<Decision, ToolError> {
        let DecisionTicket { id, rx } = ticket;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ToolError::Cancelled),
            // A dropped sender means the gate was reset
            result = rx => result.unwrap_or(Err(ToolError::Cancelled)),
        };

        self.release(&id);
        outcome
    }

    fn release(&self, id: &str) {
        {
            let mut waiter = lock(&self.waiter);
            if waiter.as_ref().is_some_and(|w| w.id == id) {
                *waiter = None;
            }
        }
        self.pending.send_if_modified(|pending| {
            if pending.as_ref().is_some_and(|p| p.id == id) {
                *pending = None;
                true
            } else {
                false
            }
        });
    }

    /// Hand `decision` to the waiter registered for `generation`.
    ///
    /// Returns false, and does nothing, when no such waiter exists.
    pub fn resolve(&self, generation: u64, decision: Decision) -> bool {
        let waiter = {
            let mut slot = lock(&self.waiter);
            match slot.as_ref() {
                Some(w) if w.generation == generation => slot.take(),
                _ => None,
            }
        };

        match waiter {
            Some(waiter) => {
                debug!(decision_id = %waiter.id, status = ?decision.status, "Decision resolved");
                let _ = waiter.tx.send(Ok(decision));
                true
            }
            None => {
                debug!(generation, "No pending decision to resolve");
                false
            }
        }
    }

    /// Drop any waiter and clear the pending slot.
    pub fn reset(&self) {
        // Dropping the sender wakes the waiter as cancelled
        lock(&self.waiter).take();
        self.pending.send_replace(None);
    }

    pub fn pending(&self) -> Option<PendingDecision> {
        self.pending.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PendingDecision>> {
        self.pending.subscribe()
    }
}

impl Default for DecisionGate {
    fn default() -> Self {
        Self::new()
    }
}
