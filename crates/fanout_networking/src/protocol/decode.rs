//! # Packet Decoding
//!
//! Receiving side of the snapshot packet, for packets whose entity body was
//! written by [`PodEntityDelta`]. Table update records are opaque to this
//! reader and end decoding with `None`.

use fanout_core::{BitReader, TempEntity};

use super::entity::{EntityRecord, PodEntityDelta};
use super::sound::{read_sound_batch, SoundBatch};
use super::temp_entities::read_temp_entities;
use super::tick::NetTick;
use super::{RecordKind, RECORD_KIND_BITS};

/// Everything read back from one snapshot packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedPacket {
    /// Tick record.
    pub tick: NetTick,
    /// Entity record, if present.
    pub entities: Option<EntityRecord>,
    /// Temp entities, empty if the record was omitted.
    pub temp_entities: Vec<TempEntity>,
    /// Sound record, if present.
    pub sounds: Option<SoundBatch>,
}

/// Reads snapshot packets.
pub struct PacketReader<'a> {
    reader: BitReader<'a>,
}

impl<'a> PacketReader<'a> {
    /// Creates a reader over the first `bit_len` bits of `data`.
    #[must_use]
    pub fn new(data: &'a [u8], bit_len: usize) -> Self {
        Self {
            reader: BitReader::with_bit_len(data, bit_len),
        }
    }

    /// Creates a reader over a whole byte buffer.
    ///
    /// Trailing padding shorter than a record kind is ignored.
    #[must_use]
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self {
            reader: BitReader::new(data),
        }
    }

    /// Decodes the packet. Returns `None` on malformed or unknown records.
    pub fn decode(mut self) -> Option<DecodedPacket> {
        let r = &mut self.reader;

        if RecordKind::from_bits(r.read_bits(RECORD_KIND_BITS)?)? != RecordKind::Tick {
            return None;
        }
        let mut packet = DecodedPacket {
            tick: NetTick::read(r)?,
            ..DecodedPacket::default()
        };

        while r.bits_left() >= usize::from(RECORD_KIND_BITS) {
            let raw = r.read_bits(RECORD_KIND_BITS)?;
            // All-zero tail is byte padding
            if raw == 0 && r.bits_left() < 8 {
                break;
            }
            match RecordKind::from_bits(raw)? {
                RecordKind::Entities => {
                    let delta_from = if r.read_bool()? {
                        Some(r.read_u32()?)
                    } else {
                        None
                    };
                    let changes = PodEntityDelta::read_body(r)?;
                    packet.entities = Some(EntityRecord {
                        delta_from,
                        changes,
                    });
                }
                RecordKind::TempEntities => packet.temp_entities = read_temp_entities(r)?,
                RecordKind::Sounds => packet.sounds = Some(read_sound_batch(r)?),
                RecordKind::Tick | RecordKind::TableUpdate => return None,
            }
        }

        Some(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::EntityDeltaWriter;
    use crate::protocol::{write_entity_header, write_sound_batch, write_temp_entities, SoundEvent};
    use crate::server::ClientId;
    use fanout_core::{BitWriter, EntityState, SnapshotFrame, SnapshotStore, TickTiming};

    #[test]
    fn test_decode_full_packet() {
        let store = SnapshotStore::new(0);
        let snap = store
            .create(9, SnapshotFrame::with_entities(vec![EntityState::new(1, 2)]))
            .unwrap();
        let temp = vec![TempEntity::new(4, vec![0xAAu8]).unwrap()];
        let sounds = vec![SoundEvent::new(1, 5)];

        let mut buf = BitWriter::new(1024);
        let mut scratch = BitWriter::new(256);
        assert!(NetTick::new(9, TickTiming::default()).write(&mut buf));
        assert!(write_entity_header(&mut buf, None));
        PodEntityDelta.write_delta(ClientId(1), &snap, None, &mut buf);
        assert!(write_temp_entities(&mut buf, &temp));
        assert!(write_sound_batch(&mut buf, &mut scratch, &sounds, false));

        let packet = PacketReader::from_bytes(buf.as_slice()).decode().unwrap();
        assert_eq!(packet.tick.tick, 9);
        assert_eq!(packet.entities.unwrap().changes.len(), 1);
        assert_eq!(packet.temp_entities, temp);
        assert_eq!(packet.sounds.unwrap().events, sounds);
    }

    #[test]
    fn test_decode_rejects_missing_tick() {
        let mut buf = BitWriter::new(64);
        assert!(write_entity_header(&mut buf, None));
        assert!(PacketReader::from_bytes(buf.as_slice()).decode().is_none());
    }
}
