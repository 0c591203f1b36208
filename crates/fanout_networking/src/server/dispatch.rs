//! # Transmission Dispatcher
//!
//! Hands a finished packet to the session's transport.
//!
//! | Update | Path                          | After                       |
//! |--------|-------------------------------|-----------------------------|
//! | Full   | `send_reliable` + `transmit`  | force-wait until acked      |
//! | Delta  | `send_unreliable`, bytes > 0  |                             |
//! | Bot    | loopback, or none             | acked locally at this tick  |

use tracing::trace;

use super::session::ClientSession;
use super::writer::UpdateKind;
use crate::error::DisconnectReason;

/// Result of handing a packet to the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The transport accepted the packet.
    Sent {
        /// Full or delta.
        kind: UpdateKind,
        /// Packet length.
        bytes: usize,
    },
    /// No transport; bookkeeping only.
    LocalOnly,
    /// The transport failed; the session must be dropped.
    Failed(DisconnectReason),
}

/// Sends packets and keepalives.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransmissionDispatcher;

impl TransmissionDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Sends the packet sitting in the session's scratch buffer.
    pub fn dispatch(&self, session: &mut ClientSession, kind: UpdateKind, tick: u32) -> DispatchOutcome {
        let Some(transport) = session.transport.as_mut() else {
            session.acknowledge_locally(tick);
            return DispatchOutcome::LocalOnly;
        };

        if !transport.is_channel_healthy() {
            return DispatchOutcome::Failed(DisconnectReason::ChannelUnhealthy);
        }

        let data = session.scratch.as_slice();
        let bytes = data.len();
        let sent = match kind {
            UpdateKind::Full => {
                let ok = transport.send_reliable(data) && transport.transmit();
                session.begin_force_wait(tick);
                ok
            }
            UpdateKind::Delta => transport.send_unreliable(data) > 0,
        };

        if sent {
            // Nobody acks for a bot, loopback or not
            if session.is_bot() {
                session.acknowledge_locally(tick);
            }
            trace!(client = %session.id(), tick, bytes, ?kind, "Snapshot sent");
            DispatchOutcome::Sent { kind, bytes }
        } else {
            DispatchOutcome::Failed(DisconnectReason::SendFailed)
        }
    }

    /// Flushes the channel without a new packet.
    ///
    /// # Errors
    ///
    /// Returns the disconnect reason if the channel failed.
    pub fn keepalive(&self, session: &mut ClientSession) -> Result<(), DisconnectReason> {
        let Some(transport) = session.transport.as_mut() else {
            return Ok(());
        };
        if !transport.is_channel_healthy() {
            return Err(DisconnectReason::ChannelUnhealthy);
        }
        if transport.transmit() {
            Ok(())
        } else {
            Err(DisconnectReason::SendFailed)
        }
    }
}
