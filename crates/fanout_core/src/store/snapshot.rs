//! # Snapshots and Snapshot Handles

use std::ops::Deref;
use std::sync::Arc;

use super::frame::{EntityState, SnapshotFrame, TempEntity, TickTiming};
use super::registry::SnapshotStore;

/// Immutable world state captured at one tick.
#[derive(Debug)]
pub struct Snapshot {
    id: u64,
    tick: u32,
    frame: SnapshotFrame,
}

impl Snapshot {
    pub(crate) fn new(id: u64, tick: u32, frame: SnapshotFrame) -> Self {
        Self { id, tick, frame }
    }

    /// Store-unique identity of this snapshot.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Server tick of this snapshot.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    /// Host frame timing captured with the tick.
    #[inline]
    #[must_use]
    pub const fn timing(&self) -> TickTiming {
        self.frame.timing
    }

    /// Entity states.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityState] {
        &self.frame.entities
    }

    /// Temp entities produced during this tick.
    #[inline]
    #[must_use]
    pub fn temp_entities(&self) -> &[TempEntity] {
        &self.frame.temp_entities
    }
}

/// Owning handle worth one reference on a stored snapshot.
///
/// Cloning retains, dropping releases. Both go through the store lock.
pub struct SnapshotRef {
    store: Arc<SnapshotStore>,
    snapshot: Arc<Snapshot>,
    /// False once the reference has been handed back to the store by a
    /// combined operation (see [`SnapshotStore::replace`]).
    armed: bool,
}

impl SnapshotRef {
    /// Wraps a reference the store has already counted.
    pub(crate) fn counted(store: Arc<SnapshotStore>, snapshot: Arc<Snapshot>) -> Self {
        Self {
            store,
            snapshot,
            armed: true,
        }
    }

    pub(crate) fn shared(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Marks this handle's reference as already released.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    /// Returns true if both handles point at the same snapshot.
    #[inline]
    #[must_use]
    pub fn same_snapshot(&self, other: &SnapshotRef) -> bool {
        self.snapshot.id == other.snapshot.id
    }

    /// The store this reference belongs to.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }
}

impl Deref for SnapshotRef {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl Clone for SnapshotRef {
    fn clone(&self) -> Self {
        self.store.retain(self)
    }
}

impl Drop for SnapshotRef {
    fn drop(&mut self) {
        if self.armed {
            self.store.release_counted(self.snapshot.tick, self.snapshot.id);
        }
    }
}

impl std::fmt::Debug for SnapshotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotRef")
            .field("id", &self.snapshot.id)
            .field("tick", &self.snapshot.tick)
            .finish()
    }
}
