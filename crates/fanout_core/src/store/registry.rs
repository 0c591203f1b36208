//! # Store Registry
//!
//! The single authority for snapshot create/retain/release.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::{StoreError, StoreResult};
use super::frame::{SnapshotFrame, TempEntity};
use super::snapshot::{Snapshot, SnapshotRef};

/// Store bookkeeping counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Snapshots created since the store was built.
    pub created: u64,
    /// Snapshots whose count reached zero and were destroyed.
    pub freed: u64,
    /// Snapshots currently alive.
    pub live: usize,
    /// Snapshots currently held by the history window.
    pub history: usize,
}

struct Entry {
    snapshot: Arc<Snapshot>,
    refs: u32,
}

struct StoreInner {
    next_id: u64,
    /// Live snapshots, ordered by tick.
    entries: BTreeMap<u32, Entry>,
    /// Ticks the history window holds a reference on, oldest first.
    history: VecDeque<u32>,
    created: u64,
    freed: u64,
}

impl StoreInner {
    fn insert(&mut self, tick: u32, frame: SnapshotFrame, refs: u32) -> StoreResult<Arc<Snapshot>> {
        if self.entries.contains_key(&tick) {
            return Err(StoreError::DuplicateTick(tick));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.created += 1;

        let snapshot = Arc::new(Snapshot::new(id, tick, frame));
        self.entries.insert(
            tick,
            Entry {
                snapshot: Arc::clone(&snapshot),
                refs,
            },
        );
        Ok(snapshot)
    }

    fn retain(&mut self, tick: u32, id: u64) {
        match self.entries.get_mut(&tick) {
            Some(entry) if entry.snapshot.id() == id => {
                entry.refs += 1;
            }
            _ => {
                tracing::error!(tick, id, "retain on a snapshot the store does not hold");
                debug_assert!(false, "retain on dead snapshot {id} (tick {tick})");
            }
        }
    }

    /// Drops one reference and destroys the snapshot when it was the last.
    fn release(&mut self, tick: u32, id: u64) {
        let Some(entry) = self.entries.get_mut(&tick) else {
            tracing::error!(tick, id, "release on a snapshot the store does not hold");
            debug_assert!(false, "release on dead snapshot {id} (tick {tick})");
            return;
        };

        if entry.snapshot.id() != id || entry.refs == 0 {
            tracing::error!(tick, id, refs = entry.refs, "unbalanced snapshot release");
            debug_assert!(false, "unbalanced release on snapshot {id} (tick {tick})");
            return;
        }

        entry.refs -= 1;
        if entry.refs == 0 {
            self.entries.remove(&tick);
            self.freed += 1;
            tracing::trace!(tick, id, "snapshot freed");
        }
    }
}

/// Reference-counted store of immutable per-tick snapshots.
///
/// One mutex guards every count change, every destroy and every walk over
/// the list of live snapshots. Handles ([`SnapshotRef`]) keep the store
/// alive through an `Arc`.
///
/// ## Usage
///
/// ```rust
/// use fanout_core::{SnapshotStore, SnapshotFrame};
///
/// let store = SnapshotStore::new(2);
/// let s1 = store.publish(1, SnapshotFrame::default()).unwrap();
/// let extra = s1.clone();                   // retain
/// assert_eq!(store.ref_count(&s1), 3);
/// drop(extra);                              // release
/// drop(s1);
///
/// // Window of 2: publishing ticks 2 and 3 evicts tick 1
/// drop(store.publish(2, SnapshotFrame::default()).unwrap());
/// drop(store.publish(3, SnapshotFrame::default()).unwrap());
/// assert!(store.find(1).is_none());
/// assert_eq!(store.stats().freed, 1);
/// ```
pub struct SnapshotStore {
    inner: Mutex<StoreInner>,
    history_window: usize,
}

impl SnapshotStore {
    /// Creates a store that retains the `history_window` newest published
    /// snapshots on behalf of the simulation.
    #[must_use]
    pub fn new(history_window: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(StoreInner {
                next_id: 0,
                entries: BTreeMap::new(),
                history: VecDeque::with_capacity(history_window),
                created: 0,
                freed: 0,
            }),
            history_window,
        })
    }

    /// Number of published snapshots kept alive by the store itself.
    #[inline]
    #[must_use]
    pub const fn history_window(&self) -> usize {
        self.history_window
    }

    /// Creates a snapshot with a reference count of one, owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTick`] if a live snapshot already
    /// exists for `tick`.
    pub fn create(self: &Arc<Self>, tick: u32, frame: SnapshotFrame) -> StoreResult<SnapshotRef> {
        let snapshot = self.inner.lock().insert(tick, frame, 1)?;
        Ok(SnapshotRef::counted(Arc::clone(self), snapshot))
    }

    /// Creates a snapshot and retains it in the history window.
    ///
    /// The returned handle is the caller's reference; the window holds a
    /// second one. When the window is full its oldest snapshot is released.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTick`] if a live snapshot already
    /// exists for `tick`.
    pub fn publish(self: &Arc<Self>, tick: u32, frame: SnapshotFrame) -> StoreResult<SnapshotRef> {
        let mut inner = self.inner.lock();

        let windowed = self.history_window > 0;
        let snapshot = inner.insert(tick, frame, if windowed { 2 } else { 1 })?;

        if windowed {
            inner.history.push_back(tick);
            while inner.history.len() > self.history_window {
                if let Some(oldest) = inner.history.pop_front() {
                    let id = inner.entries.get(&oldest).map(|e| e.snapshot.id());
                    if let Some(id) = id {
                        inner.release(oldest, id);
                    }
                }
            }
        }
        drop(inner);

        Ok(SnapshotRef::counted(Arc::clone(self), snapshot))
    }

    /// Takes another reference on `snapshot`.
    #[must_use]
    pub fn retain(&self, snapshot: &SnapshotRef) -> SnapshotRef {
        debug_assert!(std::ptr::eq(self, Arc::as_ptr(snapshot.store())));
        self.inner.lock().retain(snapshot.tick(), snapshot.id());
        SnapshotRef::counted(Arc::clone(snapshot.store()), snapshot.shared())
    }

    /// Gives back a reference. Destroys the snapshot if it was the last.
    pub fn release(&self, snapshot: SnapshotRef) {
        debug_assert!(std::ptr::eq(self, Arc::as_ptr(snapshot.store())));
        drop(snapshot);
    }

    pub(crate) fn release_counted(&self, tick: u32, id: u64) {
        self.inner.lock().release(tick, id);
    }

    /// Retains the live snapshot for `tick`, if any.
    #[must_use]
    pub fn find(self: &Arc<Self>, tick: u32) -> Option<SnapshotRef> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(&tick)?;
        entry.refs += 1;
        let snapshot = Arc::clone(&entry.snapshot);
        drop(inner);

        Some(SnapshotRef::counted(Arc::clone(self), snapshot))
    }

    /// Points `slot` at `new`: retains the new snapshot, then releases the
    /// old one, in one critical section.
    pub fn replace(&self, slot: &mut Option<SnapshotRef>, new: Option<&SnapshotRef>) {
        let mut inner = self.inner.lock();

        let next = new.map(|snapshot| {
            inner.retain(snapshot.tick(), snapshot.id());
            SnapshotRef::counted(Arc::clone(snapshot.store()), snapshot.shared())
        });

        let mut previous = slot.take();
        if let Some(old) = previous.as_mut() {
            inner.release(old.tick(), old.id());
            old.disarm();
        }
        *slot = next;
        drop(inner);

        // Already released above; dropping the handle is now a no-op.
        drop(previous);
    }

    /// Collects the temp entities of every live snapshot after `from` up to
    /// and including `to`. Without `from`, only `to`'s own records.
    ///
    /// When more than `max` records exist, the newest `max` are kept.
    #[must_use]
    pub fn temp_entities_between(
        &self,
        from: Option<&SnapshotRef>,
        to: &SnapshotRef,
        max: usize,
    ) -> Vec<TempEntity> {
        let hi = to.tick();
        let lo = match from {
            Some(from) => match from.tick().checked_add(1) {
                Some(lo) => lo,
                None => return Vec::new(),
            },
            None => hi,
        };
        if lo > hi || max == 0 {
            return Vec::new();
        }

        let inner = self.inner.lock();
        let total: usize = inner
            .entries
            .range(lo..=hi)
            .map(|(_, e)| e.snapshot.temp_entities().len())
            .sum();

        inner
            .entries
            .range(lo..=hi)
            .flat_map(|(_, e)| e.snapshot.temp_entities().iter())
            .skip(total.saturating_sub(max))
            .cloned()
            .collect()
    }

    /// Current reference count of `snapshot`.
    #[must_use]
    pub fn ref_count(&self, snapshot: &SnapshotRef) -> u32 {
        self.ref_count_at(snapshot.tick()).unwrap_or(0)
    }

    /// Current reference count of the live snapshot at `tick`.
    #[must_use]
    pub fn ref_count_at(&self, tick: u32) -> Option<u32> {
        self.inner.lock().entries.get(&tick).map(|e| e.refs)
    }

    /// Returns true if a snapshot for `tick` is alive.
    #[must_use]
    pub fn is_live(&self, tick: u32) -> bool {
        self.inner.lock().entries.contains_key(&tick)
    }

    /// Releases every reference held by the history window.
    pub fn clear_history(&self) {
        let mut inner = self.inner.lock();
        while let Some(tick) = inner.history.pop_front() {
            let id = inner.entries.get(&tick).map(|e| e.snapshot.id());
            if let Some(id) = id {
                inner.release(tick, id);
            }
        }
    }

    /// Returns store counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            created: inner.created,
            freed: inner.freed,
            live: inner.entries.len(),
            history: inner.history.len(),
        }
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("history_window", &self.history_window)
            .field("stats", &self.stats())
            .finish()
    }
}
