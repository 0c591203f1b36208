//! # Client Sessions
//!
//! Per-client state the pipeline reads and updates once per tick.
//!
//! ## Acknowledgement Flow
//!
//! ```text
//!  full update sent at T ──► force_wait_for_tick = T   (keepalives only)
//!  client acks T         ──► delta_tick = T, window closed
//!  next tick             ──► delta against T
//! ```

use std::fmt;

use fanout_core::{BitWriter, SnapshotRef};
use tracing::info;

use crate::config::BroadcastConfig;
use crate::error::DisconnectReason;
use crate::events::EventQueue;
use crate::integration::{LoopbackTransport, Transport};
use crate::protocol::SoundEvent;

/// Unique identifier for a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a session still receives snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Receiving snapshots.
    #[default]
    Active,
    /// Dropped; skipped by the broadcaster.
    Disconnected,
}

/// Per-record packet tracing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceMode {
    /// No tracing.
    #[default]
    Off,
    /// Trace the next packet only.
    NextPacket,
    /// Trace every packet.
    Always,
}

/// Per-client broadcast state.
pub struct ClientSession {
    id: ClientId,
    name: String,
    state: SessionState,
    disconnect_reason: Option<DisconnectReason>,
    is_bot: bool,
    trace: TraceMode,
    delta_tick: Option<u32>,
    string_table_ack_tick: Option<u32>,
    force_wait_for_tick: Option<u32>,
    /// Last snapshot handed to the dispatcher. One reference held.
    pub(crate) last_sent: Option<SnapshotRef>,
    pub(crate) sounds: EventQueue<SoundEvent>,
    pub(crate) transport: Option<Box<dyn Transport>>,
    /// Packet under construction. Reset at the start of every write.
    pub(crate) scratch: BitWriter,
    /// Sound payload under construction.
    pub(crate) sound_scratch: BitWriter,
}

impl ClientSession {
    /// Creates a session for a connected client.
    #[must_use]
    pub fn new(
        id: ClientId,
        name: impl Into<String>,
        transport: Box<dyn Transport>,
        config: &BroadcastConfig,
    ) -> Self {
        Self::build(id, name.into(), Some(transport), false, config)
    }

    /// Creates a session for a bot.
    ///
    /// Bots have no channel: the pipeline only does bookkeeping for them,
    /// unless `simulate_bot_traffic` is on, in which case their packets go
    /// through a [`LoopbackTransport`].
    #[must_use]
    pub fn bot(id: ClientId, name: impl Into<String>, config: &BroadcastConfig) -> Self {
        let transport: Option<Box<dyn Transport>> = if config.simulate_bot_traffic {
            Some(Box::new(LoopbackTransport::new()))
        } else {
            None
        };
        Self::build(id, name.into(), transport, true, config)
    }

    fn build(
        id: ClientId,
        name: String,
        transport: Option<Box<dyn Transport>>,
        is_bot: bool,
        config: &BroadcastConfig,
    ) -> Self {
        let sound_capacity = config.scratch_capacity.min(usize::from(u16::MAX));
        Self {
            id,
            name,
            state: SessionState::Active,
            disconnect_reason: None,
            is_bot,
            trace: TraceMode::Off,
            delta_tick: None,
            string_table_ack_tick: None,
            force_wait_for_tick: None,
            last_sent: None,
            sounds: EventQueue::new(config.max_pending_sounds),
            transport,
            scratch: BitWriter::new(config.scratch_capacity),
            sound_scratch: BitWriter::new(sound_capacity),
        }
    }

    /// Client id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Display name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for bots.
    #[inline]
    #[must_use]
    pub const fn is_bot(&self) -> bool {
        self.is_bot
    }

    /// Connection state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// True while the session receives snapshots.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Why the session was dropped, if it was.
    #[inline]
    #[must_use]
    pub const fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    /// Last snapshot sent to this client.
    #[inline]
    #[must_use]
    pub fn last_sent(&self) -> Option<&SnapshotRef> {
        self.last_sent.as_ref()
    }

    /// Tick of the last snapshot sent to this client.
    #[inline]
    #[must_use]
    pub fn last_sent_tick(&self) -> Option<u32> {
        self.last_sent.as_ref().map(|s| s.tick())
    }

    /// Acknowledged baseline tick. `None` means no compression.
    #[inline]
    #[must_use]
    pub const fn delta_tick(&self) -> Option<u32> {
        self.delta_tick
    }

    /// Last tick whose table updates the client acknowledged.
    #[inline]
    #[must_use]
    pub const fn string_table_ack_tick(&self) -> Option<u32> {
        self.string_table_ack_tick
    }

    /// Tick of an unacknowledged full update, if one is outstanding.
    #[inline]
    #[must_use]
    pub const fn force_wait_for_tick(&self) -> Option<u32> {
        self.force_wait_for_tick
    }

    /// Records a client acknowledgement of `tick`.
    pub fn acknowledge(&mut self, tick: u32) {
        self.delta_tick = Some(tick);
        self.string_table_ack_tick = Some(tick);
        if self.force_wait_for_tick.is_some_and(|wait| tick >= wait) {
            self.force_wait_for_tick = None;
        }
    }

    /// Forces the next snapshot to be a full update.
    pub fn request_full_update(&mut self) {
        self.delta_tick = None;
    }

    /// Resets baseline bookkeeping before a full update is written.
    pub fn on_request_full_update(&mut self) {
        self.delta_tick = None;
        self.string_table_ack_tick = None;
    }

    /// Queues a sound for the next packet.
    ///
    /// Returns false if the oldest pending sound was evicted to make room.
    pub fn push_sound(&mut self, event: SoundEvent) -> bool {
        self.sounds.push(event)
    }

    /// Sounds waiting for a packet.
    #[inline]
    #[must_use]
    pub fn pending_sounds(&self) -> usize {
        self.sounds.len()
    }

    /// Sets the tracing mode.
    pub fn set_trace(&mut self, mode: TraceMode) {
        self.trace = mode;
    }

    /// Current tracing mode.
    #[inline]
    #[must_use]
    pub const fn trace_mode(&self) -> TraceMode {
        self.trace
    }

    /// True if the next packet is traced.
    #[inline]
    #[must_use]
    pub fn is_tracing(&self) -> bool {
        self.trace != TraceMode::Off
    }

    /// True if a transport carries this session's packets.
    #[inline]
    #[must_use]
    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Ends a one-shot trace after its packet was written.
    pub(crate) fn end_packet_trace(&mut self) {
        if self.trace == TraceMode::NextPacket {
            self.trace = TraceMode::Off;
        }
    }

    /// Opens the full-update window at `tick`.
    pub(crate) fn begin_force_wait(&mut self, tick: u32) {
        self.force_wait_for_tick = Some(tick);
    }

    /// Bookkeeping for a bot: treat `tick` as received, ending any
    /// force-wait it opened.
    pub(crate) fn acknowledge_locally(&mut self, tick: u32) {
        self.delta_tick = Some(tick);
        self.string_table_ack_tick = Some(tick);
        self.force_wait_for_tick = None;
    }

    /// Drops the session.
    ///
    /// The transport is told why, the last-sent reference is released and
    /// pending sounds are discarded.
    pub fn disconnect(&mut self, reason: DisconnectReason) {
        if self.state == SessionState::Disconnected {
            return;
        }
        info!(client = %self.id, name = %self.name, %reason, "Disconnecting client");

        self.state = SessionState::Disconnected;
        self.disconnect_reason = Some(reason);
        if let Some(transport) = self.transport.as_mut() {
            transport.disconnect(reason);
        }
        self.last_sent = None;
        self.sounds.clear();
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("is_bot", &self.is_bot)
            .field("delta_tick", &self.delta_tick)
            .field("force_wait_for_tick", &self.force_wait_for_tick)
            .field("last_sent", &self.last_sent_tick())
            .field("pending_sounds", &self.sounds.len())
            .finish_non_exhaustive()
    }
}
