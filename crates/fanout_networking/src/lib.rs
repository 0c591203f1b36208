//! # FANOUT Networking - Per-Client Snapshot Broadcast
//!
//! Builds and sends every connected client its update for the current tick,
//! from many worker threads at once.
//!
//! ## Architecture
//!
//! - **Resolver**: acknowledged tick → retained baseline, or a full update
//! - **Writer**: tick, table, entity, temp entity and sound records into a
//!   fixed-capacity bit buffer
//! - **Overflow control**: full overflow disconnects (after an optional
//!   traced retry), delta overflow drops the packet
//! - **Dispatch**: reliable full updates, unreliable deltas, bots locally
//!
//! ## Snapshot Lifetime
//!
//! ```text
//! simulation ──publish──► store (history) ──find──► baseline (one write)
//!                              │
//!                              └──replace──► session.last_sent
//! ```
//!
//! Every reference is counted under the store's lock; no snapshot is freed
//! while any session, baseline or history slot still holds it.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fanout_core::{SnapshotFrame, SnapshotStore};
//! use fanout_networking::{
//!     BroadcastConfig, BroadcastOrchestrator, BroadcastOutcome, ClientId, ClientSession,
//!     RecordingTransport, UpdateKind,
//! };
//!
//! let config = BroadcastConfig::default();
//! let store = SnapshotStore::new(config.history_window);
//! let orchestrator = BroadcastOrchestrator::new(Arc::clone(&store), config.clone());
//!
//! let mut session = ClientSession::new(
//!     ClientId(1),
//!     "player",
//!     Box::new(RecordingTransport::new()),
//!     &config,
//! );
//! let frame = store.publish(1, SnapshotFrame::default()).unwrap();
//!
//! let outcome = orchestrator.send_snapshot(&mut session, &frame);
//! assert!(matches!(outcome, BroadcastOutcome::Sent { kind: UpdateKind::Full, .. }));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod events;
pub mod integration;
pub mod protocol;
pub mod server;

// Re-exports for convenience
pub use config::{BroadcastConfig, DEFAULT_SCRATCH_CAPACITY, SINGLE_PLAYER_EVENT_LIMIT};
pub use error::{ConfigError, ConfigResult, DisconnectReason};
pub use events::{DiscardPolicy, EventQueue, FlushReport};
pub use integration::{
    Channel, EntityDeltaWriter, LoopbackTransport, NoTableSync, RecordingTransport, TableSync,
    Transport, TransportCall,
};
pub use protocol::{DecodedPacket, PacketReader, PodEntityDelta, SoundEvent};
pub use server::{
    BroadcastOrchestrator, BroadcastOutcome, ClientId, ClientSession, DeltaResolver,
    OverflowController, PacketWriter, ParallelBroadcaster, SessionState, TickReport, TraceMode,
    TransmissionDispatcher, UpdateKind, WriteResult,
};
