//! # Bounded Event Queues
//!
//! Per-client FIFO of transient events appended by the simulation between
//! ticks and flushed into packets in bounded batches.
//!
//! ```text
//!  push ──► [e0 e1 e2 ... eM] ──batch(K)──► packet gets min(M, K)
//!                             ──flush────► DiscardOverflow: queue empty
//!                                          CarryForward:    queue <= K
//! ```

mod queue;

pub use queue::{DiscardPolicy, EventQueue, FlushReport};
