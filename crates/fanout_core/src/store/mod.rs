//! # Snapshot Store
//!
//! Reference-counted, immutable per-tick world snapshots shared by every
//! client thread.
//!
//! ## The Problem
//!
//! ```text
//! Thread 1 (client A):  last_sent = S11   → release S10
//! Thread 2 (client B):  temp ents S9..S11 → walking S10's records
//!
//! Unsynchronized: A drops S10 to zero and frees it while B reads it.
//! ```
//!
//! ## The Solution: One Store Lock
//!
//! ```text
//!                ┌─────────────────────────────────┐
//!                │          SnapshotStore          │
//!                │  Mutex ─┬─ entries (by tick)    │
//!                │         ├─ history window       │
//!                │         └─ created / freed      │
//!                └───────────────┬─────────────────┘
//!                                │ Arc
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!    SnapshotRef (A)       SnapshotRef (B)       history window
//! ```
//!
//! Retain, release, free-on-zero and every walk over the shared snapshot
//! list happen inside the same critical section. Snapshot contents are
//! immutable, so entity data is read through the handle without the lock.

mod error;
mod frame;
mod registry;
mod snapshot;

pub use error::{StoreError, StoreResult};
pub use frame::{EntityState, SnapshotFrame, TempEntity, TickTiming};
pub use registry::{SnapshotStore, StoreStats};
pub use snapshot::{Snapshot, SnapshotRef};
