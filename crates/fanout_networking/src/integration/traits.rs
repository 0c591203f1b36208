//! # Integration Traits
//!
//! Collaborators the pipeline calls while building and sending a packet,
//! plus the in-process implementations used by bots, tests and the stress
//! binary.

use std::sync::Arc;

use fanout_core::{BitWriter, Snapshot};
use parking_lot::Mutex;

use crate::error::DisconnectReason;
use crate::server::ClientId;

// ============================================================================
// ENTITY SERIALIZATION
// ============================================================================

/// Writes the body of an entity record.
///
/// Called once per packet, after the record header. Shared across worker
/// threads; implementations keep no per-call state.
pub trait EntityDeltaWriter: Send + Sync {
    /// Encodes the difference between `from` and `to`, or all of `to` when
    /// there is no baseline. Overflow is reported through `buf`.
    fn write_delta(&self, client: ClientId, to: &Snapshot, from: Option<&Snapshot>, buf: &mut BitWriter);
}

// ============================================================================
// TABLE SYNCHRONIZATION
// ============================================================================

/// Writes incremental table updates the client has not acknowledged.
pub trait TableSync: Send + Sync {
    /// Writes updates newer than `ack_tick` (all of them when `None`).
    fn write_update(&self, client: ClientId, ack_tick: Option<u32>, buf: &mut BitWriter);
}

/// Table sync for hosts without replicated tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTableSync;

impl TableSync for NoTableSync {
    fn write_update(&self, _client: ClientId, _ack_tick: Option<u32>, _buf: &mut BitWriter) {}
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// A client's network channel.
pub trait Transport: Send {
    /// Queues `data` on the reliable stream.
    fn send_reliable(&mut self, data: &[u8]) -> bool;

    /// Flushes queued reliable data.
    fn transmit(&mut self) -> bool;

    /// Sends `data` as one datagram. Returns bytes sent, 0 on failure.
    fn send_unreliable(&mut self, data: &[u8]) -> usize;

    /// False once the channel has failed or timed out.
    fn is_channel_healthy(&self) -> bool;

    /// Tears the channel down.
    fn disconnect(&mut self, reason: DisconnectReason);
}

/// Transport that discards everything it is given and counts it.
///
/// Used for bots when `simulate_bot_traffic` is on.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    packets: u64,
    bytes: u64,
    pending_reliable: usize,
}

impl LoopbackTransport {
    /// Creates a loopback transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets carried so far.
    #[must_use]
    pub const fn packets(&self) -> u64 {
        self.packets
    }

    /// Bytes carried so far.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Transport for LoopbackTransport {
    fn send_reliable(&mut self, data: &[u8]) -> bool {
        self.pending_reliable += data.len();
        true
    }

    fn transmit(&mut self) -> bool {
        if self.pending_reliable > 0 {
            self.packets += 1;
            self.bytes += u64::try_from(self.pending_reliable).unwrap_or(u64::MAX);
            self.pending_reliable = 0;
        }
        true
    }

    fn send_unreliable(&mut self, data: &[u8]) -> usize {
        self.packets += 1;
        self.bytes += u64::try_from(data.len()).unwrap_or(u64::MAX);
        // An empty datagram still carries its header
        data.len().max(1)
    }

    fn is_channel_healthy(&self) -> bool {
        true
    }

    fn disconnect(&mut self, _reason: DisconnectReason) {}
}

/// How a recorded packet was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    /// Reliable stream.
    Reliable,
    /// Unreliable datagram.
    Unreliable,
}

/// One call recorded by [`RecordingTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportCall {
    /// `send_reliable` or `send_unreliable`.
    Send {
        /// Path taken.
        channel: Channel,
        /// Packet bytes.
        data: Vec<u8>,
    },
    /// `transmit`.
    Transmit,
    /// `disconnect`.
    Disconnect(DisconnectReason),
}

#[derive(Debug)]
struct Recording {
    calls: Vec<TransportCall>,
    healthy: bool,
    fail_sends: bool,
}

/// Mock transport that records every call.
///
/// Clones share one recording, so a test keeps a clone and hands the other
/// to the session.
#[derive(Clone, Debug)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingTransport {
    /// Creates a healthy transport whose sends succeed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recording {
                calls: Vec::new(),
                healthy: true,
                fail_sends: false,
            })),
        }
    }

    /// Marks the channel healthy or not.
    pub fn set_healthy(&self, healthy: bool) {
        self.inner.lock().healthy = healthy;
    }

    /// Makes every send fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.inner.lock().fail_sends = fail;
    }

    /// Every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().calls.clone()
    }

    /// Packets sent on `channel`.
    #[must_use]
    pub fn packets(&self, channel: Channel) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Send { channel: c, data } if *c == channel => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `transmit` calls.
    #[must_use]
    pub fn transmits(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, TransportCall::Transmit))
            .count()
    }

    /// Disconnect reasons received.
    #[must_use]
    pub fn disconnects(&self) -> Vec<DisconnectReason> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Disconnect(reason) => Some(*reason),
                _ => None,
            })
            .collect()
    }

    /// Forgets every recorded call.
    pub fn clear(&self) {
        self.inner.lock().calls.clear();
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for RecordingTransport {
    fn send_reliable(&mut self, data: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        if inner.fail_sends {
            return false;
        }
        inner.calls.push(TransportCall::Send {
            channel: Channel::Reliable,
            data: data.to_vec(),
        });
        true
    }

    fn transmit(&mut self) -> bool {
        let mut inner = self.inner.lock();
        inner.calls.push(TransportCall::Transmit);
        !inner.fail_sends
    }

    fn send_unreliable(&mut self, data: &[u8]) -> usize {
        let mut inner = self.inner.lock();
        if inner.fail_sends {
            return 0;
        }
        inner.calls.push(TransportCall::Send {
            channel: Channel::Unreliable,
            data: data.to_vec(),
        });
        data.len().max(1)
    }

    fn is_channel_healthy(&self) -> bool {
        self.inner.lock().healthy
    }

    fn disconnect(&mut self, reason: DisconnectReason) {
        self.inner.lock().calls.push(TransportCall::Disconnect(reason));
    }
}
