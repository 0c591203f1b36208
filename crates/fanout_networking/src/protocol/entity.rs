//! # Entity Records
//!
//! Header written by the packet writer, body written by an
//! [`EntityDeltaWriter`]. [`PodEntityDelta`] is the default body encoder:
//! it compares whole [`EntityState`] records as bytes.
//!
//! ```text
//! body := { 1 op(1) entity_id(32) [state(28 bytes) if op == upsert] }* 0
//! ```

use std::collections::{HashMap, HashSet};

use fanout_core::{BitReader, BitWriter, EntityState, Snapshot};

use super::RecordKind;
use crate::integration::EntityDeltaWriter;
use crate::server::ClientId;

/// Writes the entity record header.
///
/// `from_tick` is the baseline tick for a delta, `None` for a full update.
pub fn write_entity_header(buf: &mut BitWriter, from_tick: Option<u32>) -> bool {
    if !RecordKind::Entities.write(buf) {
        return false;
    }
    match from_tick {
        Some(tick) => buf.write_bool(true) && buf.write_u32(tick),
        None => buf.write_bool(false),
    }
}

/// One decoded change from an entity body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityChange {
    /// Entity entered or changed.
    Upsert(EntityState),
    /// Entity left.
    Remove(u32),
}

/// Decoded entity record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityRecord {
    /// Baseline tick, `None` for a full update.
    pub delta_from: Option<u32>,
    /// Changes in wire order.
    pub changes: Vec<EntityChange>,
}

/// Byte-comparing entity delta encoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct PodEntityDelta;

impl PodEntityDelta {
    const OP_UPSERT: bool = false;
    const OP_REMOVE: bool = true;

    fn write_upsert(buf: &mut BitWriter, state: &EntityState) -> bool {
        buf.write_bool(true)
            && buf.write_bool(Self::OP_UPSERT)
            && buf.write_u32(state.entity_id)
            && buf.write_bytes(bytemuck::bytes_of(state))
    }

    fn write_remove(buf: &mut BitWriter, entity_id: u32) -> bool {
        buf.write_bool(true) && buf.write_bool(Self::OP_REMOVE) && buf.write_u32(entity_id)
    }

    /// Reads an entity record body (header already consumed).
    pub fn read_body(reader: &mut BitReader<'_>) -> Option<Vec<EntityChange>> {
        let mut changes = Vec::new();
        while reader.read_bool()? {
            let remove = reader.read_bool()?;
            let entity_id = reader.read_u32()?;
            if remove {
                changes.push(EntityChange::Remove(entity_id));
            } else {
                let bytes = reader.read_bytes(EntityState::SIZE)?;
                let state: EntityState = bytemuck::pod_read_unaligned(&bytes);
                if state.entity_id != entity_id {
                    return None;
                }
                changes.push(EntityChange::Upsert(state));
            }
        }
        Some(changes)
    }
}

impl EntityDeltaWriter for PodEntityDelta {
    fn write_delta(
        &self,
        _client: ClientId,
        to: &Snapshot,
        from: Option<&Snapshot>,
        buf: &mut BitWriter,
    ) {
        let Some(from) = from else {
            for state in to.entities() {
                if !Self::write_upsert(buf, state) {
                    return;
                }
            }
            buf.write_bool(false);
            return;
        };

        let previous: HashMap<u32, &EntityState> =
            from.entities().iter().map(|e| (e.entity_id, e)).collect();

        // Entered or changed
        for state in to.entities() {
            let changed = match previous.get(&state.entity_id) {
                Some(prev) => bytemuck::bytes_of(*prev) != bytemuck::bytes_of(state),
                None => true,
            };
            if changed && !Self::write_upsert(buf, state) {
                return;
            }
        }

        // Left
        let current: HashSet<u32> = to.entities().iter().map(|e| e.entity_id).collect();
        for prev in from.entities() {
            if !current.contains(&prev.entity_id) && !Self::write_remove(buf, prev.entity_id) {
                return;
            }
        }

        buf.write_bool(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::{SnapshotFrame, SnapshotStore};

    fn entity(id: u32, health: u16) -> EntityState {
        EntityState {
            health,
            ..EntityState::new(id, 1)
        }
    }

    fn read_record(buf: &BitWriter) -> EntityRecord {
        let mut reader = BitReader::with_bit_len(buf.as_slice(), buf.bits_written());
        assert_eq!(reader.read_bits(6), Some(RecordKind::Entities as u32));
        let delta_from = if reader.read_bool().unwrap() {
            Some(reader.read_u32().unwrap())
        } else {
            None
        };
        let changes = PodEntityDelta::read_body(&mut reader).unwrap();
        EntityRecord {
            delta_from,
            changes,
        }
    }

    #[test]
    fn test_full_update_sends_everything() {
        let store = SnapshotStore::new(0);
        let to = store
            .create(5, SnapshotFrame::with_entities(vec![entity(1, 100), entity(2, 50)]))
            .unwrap();

        let mut buf = BitWriter::new(1024);
        assert!(write_entity_header(&mut buf, None));
        PodEntityDelta.write_delta(ClientId(0), &to, None, &mut buf);

        let record = read_record(&buf);
        assert_eq!(record.delta_from, None);
        assert_eq!(
            record.changes,
            vec![
                EntityChange::Upsert(entity(1, 100)),
                EntityChange::Upsert(entity(2, 50)),
            ]
        );
    }

    #[test]
    fn test_delta_sends_changes_only() {
        let store = SnapshotStore::new(0);
        let from = store
            .create(
                4,
                SnapshotFrame::with_entities(vec![entity(1, 100), entity(2, 50), entity(3, 10)]),
            )
            .unwrap();
        let to = store
            .create(
                5,
                SnapshotFrame::with_entities(vec![entity(1, 100), entity(2, 40), entity(4, 1)]),
            )
            .unwrap();

        let mut buf = BitWriter::new(1024);
        assert!(write_entity_header(&mut buf, Some(4)));
        PodEntityDelta.write_delta(ClientId(0), &to, Some(&*from), &mut buf);

        let record = read_record(&buf);
        assert_eq!(record.delta_from, Some(4));
        assert_eq!(
            record.changes,
            vec![
                EntityChange::Upsert(entity(2, 40)),
                EntityChange::Upsert(entity(4, 1)),
                EntityChange::Remove(3),
            ]
        );
    }

    #[test]
    fn test_body_overflow_is_flagged() {
        let store = SnapshotStore::new(0);
        let entities = (0..100).map(|i| entity(i, 1)).collect();
        let to = store.create(1, SnapshotFrame::with_entities(entities)).unwrap();

        let mut buf = BitWriter::new(64);
        PodEntityDelta.write_delta(ClientId(0), &to, None, &mut buf);
        assert!(buf.is_overflowed());
    }
}
