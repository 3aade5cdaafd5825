//! In-flight id registry.
//!
//! The push worker registers a record id here immediately before its network
//! attempt and removes it immediately after completion, so the broadcast
//! parser can drop the remote echo of a push that is still racing the local
//! commit. There remains a narrow window after removal and before the commit
//! is externally visible; suppression is best-effort, not a total order.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Shared set of record ids with an outbound push in progress.
///
/// Cloning is cheap; all clones observe the same set.
#[derive(Clone, Debug, Default)]
pub struct InFlightRegistry {
    inner: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an id as in-flight, returning a guard that clears it on drop.
    ///
    /// The guard keeps registration and removal paired even when the push
    /// future is cancelled or errors early.
    pub fn track(&self, id: Uuid) -> InFlightGuard {
        self.begin(id);
        InFlightGuard {
            registry: self.clone(),
            id,
        }
    }

    /// Marks an id as in-flight.
    pub fn begin(&self, id: Uuid) {
        self.inner.lock().expect("lock poisoned").insert(id);
    }

    /// Clears an id after its push completed (success or failure).
    pub fn finish(&self, id: Uuid) {
        self.inner.lock().expect("lock poisoned").remove(&id);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.lock().expect("lock poisoned").contains(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// RAII marker for one in-flight push attempt.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.finish(self.id);
    }
}
