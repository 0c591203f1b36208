//! # Delta Resolver
//!
//! Maps a session's acknowledged tick to a baseline snapshot.

use std::sync::Arc;

use fanout_core::{SnapshotRef, SnapshotStore};

use super::session::ClientSession;

/// Finds the baseline for a delta update.
#[derive(Debug, Clone)]
pub struct DeltaResolver {
    store: Arc<SnapshotStore>,
}

impl DeltaResolver {
    /// Creates a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Retained baseline for the session's acknowledged tick.
    ///
    /// `None` when the client has acknowledged nothing or the snapshot is no
    /// longer live; the caller then sends a full update.
    #[must_use]
    pub fn resolve(&self, session: &ClientSession) -> Option<SnapshotRef> {
        session.delta_tick().and_then(|tick| self.store.find(tick))
    }
}
