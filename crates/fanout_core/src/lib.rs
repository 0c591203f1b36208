//! # FANOUT Core
//!
//! Shared building blocks for the per-client snapshot broadcast pipeline:
//! - A reference-counted snapshot store, safe to hit from many client threads
//! - Fixed-capacity bit buffers with sticky overflow
//!
//! ## Architecture Rules
//!
//! 1. **One lock per store** - create/retain/release and history walks share it
//! 2. **Immutable snapshots** - contents never change after `create`
//! 3. **Overflow is data** - writers flag overflow, callers decide what it means
//!
//! ## Example
//!
//! ```rust
//! use fanout_core::{SnapshotStore, SnapshotFrame};
//!
//! let store = SnapshotStore::new(8);
//! let snapshot = store.publish(1, SnapshotFrame::default()).unwrap();
//! assert_eq!(snapshot.tick(), 1);
//! assert_eq!(store.ref_count(&snapshot), 2); // caller + history window
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bits;
pub mod store;

pub use bits::{BitReader, BitWriter};
pub use store::{
    EntityState, Snapshot, SnapshotFrame, SnapshotRef, SnapshotStore, StoreError, StoreResult,
    StoreStats, TempEntity, TickTiming,
};
