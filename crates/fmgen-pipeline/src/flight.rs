//! Per-document single-flight guard.
//!
//! At most one sync runs per document. A request that arrives while one is
//! in flight is dropped, not queued.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::trace;

use fmgen_core::DocumentId;

/// Reentrancy state of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Idle,
    InFlight { since: Instant },
}

#[derive(Debug, Default, Clone)]
pub struct SingleFlight {
    inflight: Arc<Mutex<HashMap<DocumentId, Instant>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if a sync already holds it. The claim is
    /// released when the guard drops.
    pub fn try_begin(&self, id: &DocumentId) -> Option<FlightGuard> {
        let mut inflight = self.inflight.lock();
        if inflight.contains_key(id) {
            trace!(path = %id, "sync already in flight");
            return None;
        }
        inflight.insert(id.clone(), Instant::now());
        Some(FlightGuard {
            id: id.clone(),
            inflight: Arc::clone(&self.inflight),
        })
    }

    pub fn state(&self, id: &DocumentId) -> FlightState {
        match self.inflight.lock().get(id) {
            Some(since) => FlightState::InFlight { since: *since },
            None => FlightState::Idle,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }
}

#[must_use = "the claim is released as soon as the guard is dropped"]
pub struct FlightGuard {
    id: DocumentId,
    inflight: Arc<Mutex<HashMap<DocumentId, Instant>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inflight.lock().remove(&self.id);
    }
}
