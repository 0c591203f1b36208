//! # Broadcast Server
//!
//! The per-client snapshot pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PARALLEL BROADCASTER                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  worker 0 ... worker N  (one ClientSession at a time each)  │
//! │        │                                                    │
//! │        ▼                                                    │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Delta        │─►│ Packet       │─►│ Overflow     │       │
//! │  │ Resolver     │  │ Writer       │  │ Controller   │       │
//! │  └──────────────┘  └──────────────┘  └──────┬───────┘       │
//! │         │                                   ▼               │
//! │         │                           ┌──────────────┐        │
//! │         │                           │ Transmission │        │
//! │         │                           │ Dispatcher   │        │
//! │         ▼                           └──────────────┘        │
//! │  ┌───────────────────────┐                                  │
//! │  │ Snapshot Store (Arc)  │ ◄── last_sent replace            │
//! │  └───────────────────────┘                                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod broadcast;
mod dispatch;
mod overflow;
mod parallel;
mod resolver;
mod session;
mod writer;

pub use broadcast::{BroadcastOrchestrator, BroadcastOutcome};
pub use dispatch::{DispatchOutcome, TransmissionDispatcher};
pub use overflow::{AttemptState, OverflowController, OverflowDecision};
pub use parallel::{ParallelBroadcaster, TickReport};
pub use resolver::DeltaResolver;
pub use session::{ClientId, ClientSession, SessionState, TraceMode};
pub use writer::{PacketWriter, TraceEntry, UpdateKind, WriteResult};
