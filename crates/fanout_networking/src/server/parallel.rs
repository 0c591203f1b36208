//! # Parallel Broadcast
//!
//! Fans one tick's snapshot out to every client on a pool of scoped worker
//! threads.
//!
//! ```text
//!                  ┌──────────┐
//!  session idx ──► │ work rx  │ ──► worker 0 ─┐
//!                  │ (MPMC)   │ ──► worker 1 ─┼──► outcome rx ──► TickReport
//!                  │          │ ──► worker N ─┘
//!                  └──────────┘
//! ```
//!
//! Workers share the orchestrator and the snapshot handle. Each session is
//! locked by exactly one worker at a time; the store's own lock is the only
//! other synchronization.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use fanout_core::{SnapshotFrame, SnapshotRef, StoreResult};
use parking_lot::Mutex;
use tracing::trace;

use super::broadcast::{BroadcastOrchestrator, BroadcastOutcome};
use super::session::ClientSession;
use super::writer::UpdateKind;

/// Aggregated outcomes of one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick broadcast.
    pub tick: u32,
    /// Full updates sent.
    pub full: usize,
    /// Deltas sent.
    pub delta: usize,
    /// Keepalives.
    pub keepalive: usize,
    /// Deltas dropped on overflow.
    pub dropped: usize,
    /// Bots handled without a transport.
    pub local: usize,
    /// Sessions dropped this tick.
    pub disconnected: usize,
    /// Sessions already disconnected.
    pub skipped: usize,
    /// Bytes handed to transports.
    pub bytes: u64,
}

impl TickReport {
    /// Adds one outcome.
    pub fn record(&mut self, outcome: BroadcastOutcome) {
        match outcome {
            BroadcastOutcome::Keepalive => self.keepalive += 1,
            BroadcastOutcome::Sent { kind, bytes } => {
                match kind {
                    UpdateKind::Full => self.full += 1,
                    UpdateKind::Delta => self.delta += 1,
                }
                self.bytes += u64::try_from(bytes).unwrap_or(u64::MAX);
            }
            BroadcastOutcome::Dropped => self.dropped += 1,
            BroadcastOutcome::LocalOnly => self.local += 1,
            BroadcastOutcome::Disconnected(_) => self.disconnected += 1,
            BroadcastOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Packets handed to transports.
    #[inline]
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.full + self.delta
    }

    /// Sessions visited.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> usize {
        self.full + self.delta + self.keepalive + self.dropped + self.local + self.disconnected + self.skipped
    }
}

/// Runs the orchestrator for many sessions at once.
#[derive(Debug, Clone)]
pub struct ParallelBroadcaster {
    orchestrator: Arc<BroadcastOrchestrator>,
    workers: usize,
}

impl ParallelBroadcaster {
    /// Creates a broadcaster using the orchestrator's `worker_threads`.
    #[must_use]
    pub fn new(orchestrator: Arc<BroadcastOrchestrator>) -> Self {
        let workers = orchestrator.config().worker_threads.max(1);
        Self {
            orchestrator,
            workers,
        }
    }

    /// The shared orchestrator.
    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<BroadcastOrchestrator> {
        &self.orchestrator
    }

    /// Sends `frame` to every session.
    pub fn broadcast(&self, sessions: &[Mutex<ClientSession>], frame: &SnapshotRef) -> TickReport {
        let mut report = TickReport {
            tick: frame.tick(),
            ..TickReport::default()
        };
        if sessions.is_empty() {
            return report;
        }

        let (work_tx, work_rx) = unbounded::<usize>();
        for idx in 0..sessions.len() {
            if work_tx.send(idx).is_err() {
                break;
            }
        }
        drop(work_tx);

        let (outcome_tx, outcome_rx) = unbounded::<BroadcastOutcome>();
        let orchestrator = &*self.orchestrator;
        let workers = self.workers.min(sessions.len());

        thread::scope(|s| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let outcome_tx = outcome_tx.clone();
                s.spawn(move || {
                    for idx in work_rx.iter() {
                        let outcome = {
                            let mut session = sessions[idx].lock();
                            orchestrator.send_snapshot(&mut session, frame)
                        };
                        if outcome_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(outcome_tx);

        for outcome in outcome_rx.try_iter() {
            report.record(outcome);
        }

        trace!(
            tick = report.tick,
            full = report.full,
            delta = report.delta,
            keepalive = report.keepalive,
            bytes = report.bytes,
            "Tick broadcast"
        );
        report
    }

    /// Publishes `frame` as `tick` and broadcasts it.
    ///
    /// The caller's reference is released afterwards; the snapshot stays
    /// live through the store's history and the sessions that received it.
    ///
    /// # Errors
    ///
    /// Returns the store error if `tick` is already live.
    pub fn run_tick(
        &self,
        tick: u32,
        frame: SnapshotFrame,
        sessions: &[Mutex<ClientSession>],
    ) -> StoreResult<TickReport> {
        let snapshot = self.orchestrator.store().publish(tick, frame)?;
        Ok(self.broadcast(sessions, &snapshot))
    }
}
