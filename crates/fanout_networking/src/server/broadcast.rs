//! # Broadcast Orchestrator
//!
//! Sends one client its packet for one tick.
//!
//! ```text
//!  send_snapshot(session, frame)
//!     │
//!     ├─ disconnected?                  ──► Skipped
//!     ├─ frame already sent?            ──► keepalive
//!     ├─ waiting for full-update ack?   ──► keepalive
//!     │
//!     ├─ resolve baseline (retained)    ──► none: full update
//!     ├─ write ◄──┐
//!     ├─ overflow?┘ retry once (full)   ──► Disconnected / Dropped
//!     ├─ last_sent = frame              (store lock, before transmit)
//!     └─ dispatch                       ──► Sent / LocalOnly / Disconnected
//! ```
//!
//! The orchestrator is shared by every worker thread; all per-client state
//! lives in the [`ClientSession`] passed in.

use std::sync::Arc;

use fanout_core::{SnapshotRef, SnapshotStore};
use tracing::{debug, trace, warn};

use super::dispatch::{DispatchOutcome, TransmissionDispatcher};
use super::overflow::{OverflowController, OverflowDecision};
use super::resolver::DeltaResolver;
use super::session::ClientSession;
use super::writer::{PacketWriter, UpdateKind};
use crate::config::BroadcastConfig;
use crate::error::DisconnectReason;
use crate::integration::{EntityDeltaWriter, NoTableSync, TableSync};
use crate::protocol::PodEntityDelta;

/// What happened to one client in one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Nothing new to send; the channel was flushed.
    Keepalive,
    /// A packet went out.
    Sent {
        /// Full or delta.
        kind: UpdateKind,
        /// Packet length.
        bytes: usize,
    },
    /// A delta overflowed and was skipped.
    Dropped,
    /// Bot without a transport; bookkeeping only.
    LocalOnly,
    /// The session was dropped.
    Disconnected(DisconnectReason),
    /// The session was already disconnected.
    Skipped,
}

/// Per-client snapshot sender.
pub struct BroadcastOrchestrator {
    store: Arc<SnapshotStore>,
    config: BroadcastConfig,
    resolver: DeltaResolver,
    dispatcher: TransmissionDispatcher,
    entity_delta: Arc<dyn EntityDeltaWriter>,
    table_sync: Arc<dyn TableSync>,
}

impl BroadcastOrchestrator {
    /// Creates an orchestrator with [`PodEntityDelta`] and [`NoTableSync`].
    #[must_use]
    pub fn new(store: Arc<SnapshotStore>, config: BroadcastConfig) -> Self {
        Self {
            resolver: DeltaResolver::new(Arc::clone(&store)),
            store,
            config,
            dispatcher: TransmissionDispatcher::new(),
            entity_delta: Arc::new(PodEntityDelta),
            table_sync: Arc::new(NoTableSync),
        }
    }

    /// Replaces the entity body encoder.
    #[must_use]
    pub fn with_entity_delta(mut self, entity_delta: Arc<dyn EntityDeltaWriter>) -> Self {
        self.entity_delta = entity_delta;
        self
    }

    /// Replaces the table sync collaborator.
    #[must_use]
    pub fn with_table_sync(mut self, table_sync: Arc<dyn TableSync>) -> Self {
        self.table_sync = table_sync;
        self
    }

    /// The snapshot store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Sends `frame` to one client.
    pub fn send_snapshot(&self, session: &mut ClientSession, frame: &SnapshotRef) -> BroadcastOutcome {
        if !session.is_active() {
            return BroadcastOutcome::Skipped;
        }

        if self.config.log_debug {
            debug!(
                client = %session.id(),
                name = %session.name(),
                tick = frame.tick(),
                last_sent = ?session.last_sent_tick(),
                delta_tick = ?session.delta_tick(),
                force_wait = ?session.force_wait_for_tick(),
                "send_snapshot"
            );
        }

        let already_sent = session.last_sent().is_some_and(|last| last.same_snapshot(frame));
        if already_sent || session.force_wait_for_tick().is_some() {
            return self.keepalive(session);
        }

        // Held until the packet is written
        let baseline = self.resolver.resolve(session);
        if baseline.is_none() {
            session.on_request_full_update();
        }

        let writer = PacketWriter::new(&self.config, &*self.entity_delta, &*self.table_sync);
        let mut controller = OverflowController::new(self.config.retry_on_overflow);
        let (decision, result) =
            controller.run(|force_trace| writer.write(session, frame, baseline.as_ref(), force_trace));
        drop(baseline);
        writer.finish(session, &result);

        match decision {
            OverflowDecision::Disconnect(reason) => {
                session.disconnect(reason);
                return BroadcastOutcome::Disconnected(reason);
            }
            OverflowDecision::DropDelta => {
                warn!(
                    client = %session.id(),
                    name = %session.name(),
                    tick = frame.tick(),
                    bits = result.bits_written,
                    "Delta snapshot overflow, packet dropped"
                );
                session.scratch.reset();
                self.store.replace(&mut session.last_sent, Some(frame));
                return match self.keepalive(session) {
                    BroadcastOutcome::Keepalive => BroadcastOutcome::Dropped,
                    other => other,
                };
            }
            OverflowDecision::Transmit | OverflowDecision::Retry => {}
        }

        self.store.replace(&mut session.last_sent, Some(frame));

        match self.dispatcher.dispatch(session, result.kind, frame.tick()) {
            DispatchOutcome::Sent { kind, bytes } => BroadcastOutcome::Sent { kind, bytes },
            DispatchOutcome::LocalOnly => {
                trace!(client = %session.id(), tick = frame.tick(), "Local client, no transport");
                BroadcastOutcome::LocalOnly
            }
            DispatchOutcome::Failed(reason) => {
                session.disconnect(reason);
                BroadcastOutcome::Disconnected(reason)
            }
        }
    }

    fn keepalive(&self, session: &mut ClientSession) -> BroadcastOutcome {
        match self.dispatcher.keepalive(session) {
            Ok(()) => BroadcastOutcome::Keepalive,
            Err(reason) => {
                session.disconnect(reason);
                BroadcastOutcome::Disconnected(reason)
            }
        }
    }
}

impl std::fmt::Debug for BroadcastOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastOrchestrator")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::{Channel, RecordingTransport};
    use crate::server::ClientId;
    use fanout_core::{EntityState, SnapshotFrame};

    fn setup(config: BroadcastConfig) -> (BroadcastOrchestrator, ClientSession, RecordingTransport) {
        let store = SnapshotStore::new(16);
        let wire = RecordingTransport::new();
        let session = ClientSession::new(ClientId(1), "c", Box::new(wire.clone()), &config);
        (BroadcastOrchestrator::new(store, config), session, wire)
    }

    fn publish(orch: &BroadcastOrchestrator, tick: u32, count: u32) -> SnapshotRef {
        let entities = (0..count).map(|i| EntityState::new(i, 1)).collect();
        orch.store()
            .publish(tick, SnapshotFrame::with_entities(entities))
            .unwrap()
    }

    #[test]
    fn test_skips_disconnected() {
        let (orch, mut session, _) = setup(BroadcastConfig::default());
        let frame = publish(&orch, 1, 1);
        session.disconnect(DisconnectReason::SendFailed);
        assert_eq!(orch.send_snapshot(&mut session, &frame), BroadcastOutcome::Skipped);
    }

    #[test]
    fn test_same_frame_is_keepalive() {
        let (orch, mut session, wire) = setup(BroadcastConfig::default());
        let frame = publish(&orch, 1, 1);

        assert!(matches!(
            orch.send_snapshot(&mut session, &frame),
            BroadcastOutcome::Sent { kind: UpdateKind::Full, .. }
        ));
        session.acknowledge(1);
        wire.clear();

        assert_eq!(orch.send_snapshot(&mut session, &frame), BroadcastOutcome::Keepalive);
        assert!(wire.packets(Channel::Reliable).is_empty());
        assert!(wire.packets(Channel::Unreliable).is_empty());
        assert_eq!(wire.transmits(), 1);
    }

    #[test]
    fn test_force_wait_window() {
        let (orch, mut session, _) = setup(BroadcastConfig::default());
        let first = publish(&orch, 1, 1);
        let second = publish(&orch, 2, 1);

        orch.send_snapshot(&mut session, &first);
        assert_eq!(orch.send_snapshot(&mut session, &second), BroadcastOutcome::Keepalive);
        assert_eq!(session.last_sent_tick(), Some(1));

        session.acknowledge(1);
        assert!(matches!(
            orch.send_snapshot(&mut session, &second),
            BroadcastOutcome::Sent { kind: UpdateKind::Delta, .. }
        ));
        assert_eq!(session.last_sent_tick(), Some(2));
    }

    #[test]
    fn test_missing_baseline_falls_back_to_full() {
        let (orch, mut session, wire) = setup(BroadcastConfig::default());
        let frame = publish(&orch, 50, 2);
        session.acknowledge(7);

        assert!(matches!(
            orch.send_snapshot(&mut session, &frame),
            BroadcastOutcome::Sent { kind: UpdateKind::Full, .. }
        ));
        assert_eq!(wire.packets(Channel::Reliable).len(), 1);
        assert_eq!(session.force_wait_for_tick(), Some(50));
    }

    #[test]
    fn test_last_sent_refcount() {
        let (orch, mut session, _) = setup(BroadcastConfig::default());
        let first = publish(&orch, 1, 1);
        let second = publish(&orch, 2, 1);
        let store = Arc::clone(orch.store());

        orch.send_snapshot(&mut session, &first);
        assert_eq!(store.ref_count(&first), 3);

        session.acknowledge(1);
        orch.send_snapshot(&mut session, &second);
        assert_eq!(store.ref_count(&first), 2);
        assert_eq!(store.ref_count(&second), 3);

        session.disconnect(DisconnectReason::SendFailed);
        assert_eq!(store.ref_count(&second), 2);
    }

    #[test]
    fn test_send_failure_disconnects() {
        let (orch, mut session, wire) = setup(BroadcastConfig::default());
        let frame = publish(&orch, 1, 1);
        wire.set_fail_sends(true);

        assert_eq!(
            orch.send_snapshot(&mut session, &frame),
            BroadcastOutcome::Disconnected(DisconnectReason::SendFailed)
        );
        assert_eq!(wire.disconnects(), vec![DisconnectReason::SendFailed]);
        assert!(session.last_sent().is_none());
    }

    #[test]
    fn test_bot_local_only() {
        let config = BroadcastConfig::default();
        let store = SnapshotStore::new(4);
        let orch = BroadcastOrchestrator::new(store, config.clone());
        let frame = publish(&orch, 3, 1);
        let mut bot = ClientSession::bot(ClientId(5), "bot", &config);

        assert_eq!(orch.send_snapshot(&mut bot, &frame), BroadcastOutcome::LocalOnly);
        assert_eq!(bot.delta_tick(), Some(3));
        assert_eq!(bot.last_sent_tick(), Some(3));
    }

    #[test]
    fn test_simulated_bot_traffic() {
        let config = BroadcastConfig {
            simulate_bot_traffic: true,
            ..BroadcastConfig::default()
        };
        let store = SnapshotStore::new(4);
        let orch = BroadcastOrchestrator::new(store, config.clone());
        let mut bot = ClientSession::bot(ClientId(5), "bot", &config);

        let frame = publish(&orch, 1, 2);
        assert!(matches!(
            orch.send_snapshot(&mut bot, &frame),
            BroadcastOutcome::Sent { kind: UpdateKind::Full, .. }
        ));
        assert_eq!(bot.force_wait_for_tick(), None);

        // Each tick deltas against the one before; no keepalive lock
        for tick in 2..=5 {
            let frame = publish(&orch, tick, 2);
            assert!(matches!(
                orch.send_snapshot(&mut bot, &frame),
                BroadcastOutcome::Sent { kind: UpdateKind::Delta, .. }
            ));
            assert_eq!(bot.delta_tick(), Some(tick));
            assert_eq!(bot.force_wait_for_tick(), None);
        }
    }
}
