//! Tracks which sessions currently have a reply being generated.
//!
//! At most one exchange may be in flight per session. A second request for
//! the same session is rejected up front instead of queued, so two replies can
//! never race for the same sequence numbers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use hrchat_core::types::DbId;

/// Registry of sessions with an exchange in flight.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    active: Mutex<HashSet<DbId>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `session_id`. Returns `None` when another exchange holds it.
    ///
    /// The claim lasts until the returned permit is dropped.
    pub fn try_acquire(self: &Arc<Self>, session_id: DbId) -> Option<InFlightPermit> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(session_id) {
            return None;
        }
        Some(InFlightPermit {
            registry: Arc::clone(self),
            session_id,
        })
    }

    pub fn is_active(&self, session_id: DbId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&session_id)
    }

    /// Number of sessions currently generating.
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn release(&self, session_id: DbId) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&session_id);
    }
}

/// Exclusive claim on one session. Released on drop.
#[derive(Debug)]
pub struct InFlightPermit {
    registry: Arc<InFlightRegistry>,
    session_id: DbId,
}

impl InFlightPermit {
    pub fn session_id(&self) -> DbId {
        self.session_id
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.registry.release(self.session_id);
        tracing::trace!(session_id = self.session_id, "Released in-flight permit");
    }
}
