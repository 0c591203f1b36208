//! # Packet Writer
//!
//! Serializes one client's snapshot packet into the session's scratch
//! buffer, in a fixed record order:
//!
//! ```text
//! 1. NetTick          always
//! 2. Table update     unless table_sync_bypass
//! 3. Entities         delta against baseline, or full dump
//! 4. Temp entities    since last sent snapshot, capped, omitted when empty
//! 5. Sounds           min(pending, cap), unreliable header, omitted when empty
//! ```
//!
//! Overflow is sticky on the buffer; every step still runs so a trace shows
//! the whole packet. Writing never consumes queued sounds; [`PacketWriter::finish`]
//! truncates the queue once the packet's fate is decided, so a retried write
//! encodes the same batch.

use fanout_core::SnapshotRef;
use tracing::{debug, warn};

use super::session::ClientSession;
use crate::config::BroadcastConfig;
use crate::events::FlushReport;
use crate::integration::{EntityDeltaWriter, TableSync};
use crate::protocol::{write_entity_header, write_sound_batch, write_temp_entities, NetTick};

/// Full update or delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    /// Self-contained update, sent reliably.
    Full,
    /// Delta against an acknowledged baseline, sent unreliably.
    Delta,
}

/// Size of one record in a traced packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    /// Record name.
    pub label: &'static str,
    /// Bits the record took.
    pub bits: usize,
    /// Items in the record, for batches.
    pub count: Option<usize>,
}

/// Outcome of one packet write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteResult {
    /// Full or delta.
    pub kind: UpdateKind,
    /// Bits in the buffer.
    pub bits_written: usize,
    /// The buffer ran out at some point.
    pub overflowed: bool,
    /// The tick record itself did not fit.
    pub tick_record_failed: bool,
    /// Temp entities written.
    pub temp_entities: usize,
    /// Sounds written.
    pub sounds: usize,
    /// Per-record sizes, when traced.
    pub trace: Vec<TraceEntry>,
}

impl WriteResult {
    /// Packet length in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes_written(&self) -> usize {
        self.bits_written.div_ceil(8)
    }
}

/// Builds snapshot packets.
pub struct PacketWriter<'a> {
    config: &'a BroadcastConfig,
    entity_delta: &'a dyn EntityDeltaWriter,
    table_sync: &'a dyn TableSync,
}

impl<'a> PacketWriter<'a> {
    /// Creates a writer using the given collaborators.
    #[must_use]
    pub fn new(
        config: &'a BroadcastConfig,
        entity_delta: &'a dyn EntityDeltaWriter,
        table_sync: &'a dyn TableSync,
    ) -> Self {
        Self {
            config,
            entity_delta,
            table_sync,
        }
    }

    /// Writes the packet for `current` into the session's scratch buffer.
    ///
    /// `delta` is the retained baseline, `None` for a full update.
    /// `force_trace` records per-record sizes even when the session is not
    /// tracing.
    pub fn write(
        &self,
        session: &mut ClientSession,
        current: &SnapshotRef,
        delta: Option<&SnapshotRef>,
        force_trace: bool,
    ) -> WriteResult {
        let client = session.id();
        let ack_tick = session.string_table_ack_tick();
        let tracing = force_trace || session.is_tracing();
        let kind = if delta.is_some() {
            UpdateKind::Delta
        } else {
            UpdateKind::Full
        };

        let buf = &mut session.scratch;
        buf.reset();

        let mut trace = Vec::new();
        let mut mark = |label: &'static str, start: usize, end: usize, count: Option<usize>| {
            if tracing {
                trace.push(TraceEntry {
                    label,
                    bits: end - start,
                    count,
                });
            }
        };

        // 1. Tick
        let tick_record_failed = !NetTick::new(current.tick(), current.timing()).write(buf);
        mark("Tick", 0, buf.bits_written(), None);

        // 2. Table updates
        if !self.config.table_sync_bypass {
            let start = buf.bits_written();
            self.table_sync.write_update(client, ack_tick, buf);
            mark("Table updates", start, buf.bits_written(), None);
        }

        // 3. Entities
        let start = buf.bits_written();
        write_entity_header(buf, delta.map(|d| d.tick()));
        self.entity_delta
            .write_delta(client, current, delta.map(|d| &**d), buf);
        mark("Entities", start, buf.bits_written(), None);

        // 4. Temp entities
        let temp = current.store().temp_entities_between(
            session.last_sent.as_ref(),
            current,
            self.config.temp_entity_limit(),
        );
        if !temp.is_empty() {
            let start = buf.bits_written();
            write_temp_entities(buf, &temp);
            mark("Temp entities", start, buf.bits_written(), Some(temp.len()));
        }

        // 5. Sounds
        let batch = session.sounds.batch(self.config.sound_limit());
        let sounds = batch.len();
        if sounds > 0 {
            let start = buf.bits_written();
            // Count + 16-bit length header whatever the update kind
            write_sound_batch(buf, &mut session.sound_scratch, batch, false);
            mark("Sounds", start, buf.bits_written(), Some(sounds));
        }

        let bits_written = buf.bits_written();
        mark("Total", 0, bits_written, None);

        WriteResult {
            kind,
            bits_written,
            overflowed: buf.is_overflowed(),
            tick_record_failed,
            temp_entities: temp.len(),
            sounds,
            trace,
        }
    }

    /// Settles the sound queue after the packet described by `result` was
    /// dispatched or dropped, and ends a one-shot trace.
    pub fn finish(&self, session: &mut ClientSession, result: &WriteResult) -> FlushReport {
        let report = session.sounds.flush(
            result.sounds,
            self.config.sound_limit(),
            self.config.sound_policy,
        );
        if report.dropped > 0 {
            warn!(
                client = %session.id(),
                name = %session.name(),
                dropped = report.dropped,
                sent = report.sent,
                policy = ?self.config.sound_policy,
                "Sound queue overflow, events dropped"
            );
        }

        if !result.trace.is_empty() {
            for entry in &result.trace {
                debug!(
                    client = %session.id(),
                    record = entry.label,
                    bits = entry.bits,
                    count = entry.count,
                    "Packet trace"
                );
            }
        }
        session.end_packet_trace();

        report
    }
}
