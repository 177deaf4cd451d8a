//! Working memory store — publishes [`WorkingMemory`] snapshots.
//!
//! Each update clones the current value if a reader still holds it, so
//! snapshots handed out earlier stay frozen.

use glossa_core::memory::WorkingMemory;
use std::sync::Arc;
use tokio::sync::watch;

pub struct MemoryStore {
    tx: watch::Sender<Arc<WorkingMemory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(WorkingMemory::default()));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<WorkingMemory> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WorkingMemory>> {
        self.tx.subscribe()
    }

    pub fn update(&self, f: impl FnOnce(&mut WorkingMemory)) {
        self.tx.send_modify(|memory| f(Arc::make_mut(memory)));
    }

    /// Start over for a new task.
    pub fn reset(&self, original_text: impl Into<String>) {
        self.tx
            .send_replace(Arc::new(WorkingMemory::new(original_text)));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
