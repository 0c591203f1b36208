//! # Overflow Controller
//!
//! Decides what an overflowed packet means.
//!
//! ```text
//!              ┌────────┐  full overflow, retry on   ┌──────────┐
//!   write ───► │ Normal │ ─────────────────────────► │ Retrying │ ──► write (traced)
//!              └────────┘                            └──────────┘
//!                  │ full overflow, retry off             │ full overflow
//!                  ▼                                      ▼
//!              Disconnect                             Disconnect
//!
//!   delta overflow (either state) ──► DropDelta
//! ```
//!
//! A full update can only be resent reliably, so running out of room is
//! fatal for the session. A delta is simply skipped; the client keeps its
//! baseline and the next tick tries again.

use tracing::{debug, warn};

use super::writer::{UpdateKind, WriteResult};
use crate::error::DisconnectReason;

/// Attempt state for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttemptState {
    /// First write.
    #[default]
    Normal,
    /// Diagnostic rewrite after a full-update overflow.
    Retrying,
}

/// What to do with a written packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowDecision {
    /// The packet fits; send it.
    Transmit,
    /// Write again with tracing forced on.
    Retry,
    /// Skip this delta.
    DropDelta,
    /// Drop the session.
    Disconnect(DisconnectReason),
}

/// Two-state overflow reaction, reset every tick.
#[derive(Clone, Copy, Debug)]
pub struct OverflowController {
    retry_on_overflow: bool,
    state: AttemptState,
}

impl OverflowController {
    /// Creates a controller in [`AttemptState::Normal`].
    #[must_use]
    pub const fn new(retry_on_overflow: bool) -> Self {
        Self {
            retry_on_overflow,
            state: AttemptState::Normal,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> AttemptState {
        self.state
    }

    /// Classifies one write.
    pub fn on_written(&mut self, result: &WriteResult) -> OverflowDecision {
        if result.tick_record_failed {
            return OverflowDecision::Disconnect(DisconnectReason::TickRecordFailed);
        }
        if !result.overflowed {
            return OverflowDecision::Transmit;
        }

        match result.kind {
            UpdateKind::Delta => OverflowDecision::DropDelta,
            UpdateKind::Full => {
                if self.retry_on_overflow && self.state == AttemptState::Normal {
                    self.state = AttemptState::Retrying;
                    OverflowDecision::Retry
                } else {
                    OverflowDecision::Disconnect(DisconnectReason::ReliableOverflow)
                }
            }
        }
    }

    /// Runs `write` until the packet is settled. `write` gets `true` when
    /// tracing must be forced. At most two writes happen.
    pub fn run<F>(&mut self, mut write: F) -> (OverflowDecision, WriteResult)
    where
        F: FnMut(bool) -> WriteResult,
    {
        let mut result = write(false);
        loop {
            match self.on_written(&result) {
                OverflowDecision::Retry => {
                    debug!(bits = result.bits_written, "Full update overflowed, rewriting with trace");
                    result = write(true);
                }
                decision => {
                    if self.state == AttemptState::Retrying {
                        for entry in &result.trace {
                            warn!(record = entry.label, bits = entry.bits, count = entry.count, "Overflow trace");
                        }
                    }
                    return (decision, result);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(kind: UpdateKind, overflowed: bool) -> WriteResult {
        WriteResult {
            kind,
            bits_written: 100,
            overflowed,
            tick_record_failed: false,
            temp_entities: 0,
            sounds: 0,
            trace: Vec::new(),
        }
    }

    #[test]
    fn test_fitting_packet_transmits() {
        let mut ctl = OverflowController::new(true);
        assert_eq!(ctl.on_written(&result(UpdateKind::Full, false)), OverflowDecision::Transmit);
        assert_eq!(ctl.on_written(&result(UpdateKind::Delta, false)), OverflowDecision::Transmit);
    }

    #[test]
    fn test_delta_overflow_drops() {
        let mut ctl = OverflowController::new(true);
        assert_eq!(ctl.on_written(&result(UpdateKind::Delta, true)), OverflowDecision::DropDelta);
        assert_eq!(ctl.state(), AttemptState::Normal);
    }

    #[test]
    fn test_full_overflow_without_retry_disconnects() {
        let mut ctl = OverflowController::new(false);
        assert_eq!(
            ctl.on_written(&result(UpdateKind::Full, true)),
            OverflowDecision::Disconnect(DisconnectReason::ReliableOverflow)
        );
    }

    #[test]
    fn test_full_overflow_retries_once() {
        let mut ctl = OverflowController::new(true);
        let mut writes = Vec::new();
        let (decision, _) = ctl.run(|traced| {
            writes.push(traced);
            result(UpdateKind::Full, true)
        });
        assert_eq!(writes, vec![false, true]);
        assert_eq!(decision, OverflowDecision::Disconnect(DisconnectReason::ReliableOverflow));
        assert_eq!(ctl.state(), AttemptState::Retrying);
    }

    #[test]
    fn test_retry_that_fits_transmits() {
        let mut ctl = OverflowController::new(true);
        let mut attempt = 0;
        let (decision, _) = ctl.run(|_| {
            attempt += 1;
            result(UpdateKind::Full, attempt == 1)
        });
        assert_eq!(decision, OverflowDecision::Transmit);
    }

    #[test]
    fn test_tick_record_failure_is_fatal() {
        let mut ctl = OverflowController::new(true);
        let mut r = result(UpdateKind::Delta, true);
        r.tick_record_failed = true;
        assert_eq!(
            ctl.on_written(&r),
            OverflowDecision::Disconnect(DisconnectReason::TickRecordFailed)
        );
    }
}
