//! # Sound Records
//!
//! Sound events are delta-encoded, each against the one before it. The
//! first event in a batch is encoded against [`SoundEvent::BASELINE`].
//!
//! ```text
//! event := { changed(1) [field] } x 10     (entity, channel, sound, volume,
//!                                            pitch, flags, origin x3, delay)
//!
//! record (reliable)   := kind(6) 1 len(8)            payload
//! record (unreliable) := kind(6) 0 count(8) len(16)  payload
//! ```
//!
//! `len` counts payload bytes. The payload is padded to a byte boundary.

use fanout_core::{BitReader, BitWriter};

use super::RecordKind;

/// Number of change bits in one event; also its smallest encoding.
const FIELD_COUNT: usize = 10;

/// One sound to be played on the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SoundEvent {
    /// Entity the sound is attached to.
    pub entity: u16,
    /// Playback channel.
    pub channel: u8,
    /// Sound table index.
    pub sound_index: u16,
    /// Volume, 255 is full.
    pub volume: u8,
    /// Pitch, 100 is normal.
    pub pitch: u8,
    /// Playback flags.
    pub flags: u8,
    /// Origin in fixed-point world units.
    pub origin: [i32; 3],
    /// Start delay in milliseconds.
    pub delay_ms: u16,
}

impl SoundEvent {
    /// Value every batch's first event is encoded against.
    pub const BASELINE: Self = Self {
        entity: 0,
        channel: 0,
        sound_index: 0,
        volume: 255,
        pitch: 100,
        flags: 0,
        origin: [0; 3],
        delay_ms: 0,
    };

    /// Creates an event with baseline volume and pitch.
    #[must_use]
    pub const fn new(entity: u16, sound_index: u16) -> Self {
        Self {
            entity,
            sound_index,
            ..Self::BASELINE
        }
    }

    /// Writes this event as a delta against `prev`.
    pub fn write_delta(&self, prev: &Self, buf: &mut BitWriter) -> bool {
        fn field(buf: &mut BitWriter, changed: bool, value: u32, bits: u8) -> bool {
            if changed {
                buf.write_bool(true) && buf.write_bits(value, bits)
            } else {
                buf.write_bool(false)
            }
        }

        let head_ok = field(buf, self.entity != prev.entity, u32::from(self.entity), 16)
            && field(buf, self.channel != prev.channel, u32::from(self.channel), 8)
            && field(buf, self.sound_index != prev.sound_index, u32::from(self.sound_index), 16)
            && field(buf, self.volume != prev.volume, u32::from(self.volume), 8)
            && field(buf, self.pitch != prev.pitch, u32::from(self.pitch), 8)
            && field(buf, self.flags != prev.flags, u32::from(self.flags), 8);
        if !head_ok {
            return false;
        }

        for (cur, old) in self.origin.iter().zip(prev.origin.iter()) {
            let value = u32::from_ne_bytes(cur.to_ne_bytes());
            if !field(buf, cur != old, value, 32) {
                return false;
            }
        }

        field(buf, self.delay_ms != prev.delay_ms, u32::from(self.delay_ms), 16)
    }

    /// Reads an event encoded as a delta against `prev`.
    pub fn read_delta(prev: &Self, reader: &mut BitReader<'_>) -> Option<Self> {
        let mut event = *prev;
        if reader.read_bool()? {
            event.entity = reader.read_u16()?;
        }
        if reader.read_bool()? {
            event.channel = reader.read_u8()?;
        }
        if reader.read_bool()? {
            event.sound_index = reader.read_u16()?;
        }
        if reader.read_bool()? {
            event.volume = reader.read_u8()?;
        }
        if reader.read_bool()? {
            event.pitch = reader.read_u8()?;
        }
        if reader.read_bool()? {
            event.flags = reader.read_u8()?;
        }
        for axis in &mut event.origin {
            if reader.read_bool()? {
                *axis = reader.read_i32()?;
            }
        }
        if reader.read_bool()? {
            event.delay_ms = reader.read_u16()?;
        }
        Some(event)
    }
}

impl Default for SoundEvent {
    fn default() -> Self {
        Self::BASELINE
    }
}

/// Decoded sound record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoundBatch {
    /// Header carried only the 8-bit payload length.
    pub reliable: bool,
    /// Events in wire order.
    pub events: Vec<SoundEvent>,
}

/// Writes a sound record for `events`, kind included.
///
/// Events are first encoded into `scratch`, then copied behind the header.
/// If the encoded payload does not fit the length field, or `scratch` runs
/// out, `buf` is flagged as overflowed.
pub fn write_sound_batch(
    buf: &mut BitWriter,
    scratch: &mut BitWriter,
    events: &[SoundEvent],
    reliable: bool,
) -> bool {
    scratch.reset();
    let mut prev = SoundEvent::BASELINE;
    for event in events {
        if !event.write_delta(&prev, scratch) {
            break;
        }
        prev = *event;
    }
    if !scratch.align_to_byte() {
        buf.set_overflowed();
        return false;
    }

    let Ok(count) = u8::try_from(events.len()) else {
        buf.set_overflowed();
        return false;
    };
    let len = scratch.bytes_written();

    let header_ok = RecordKind::Sounds.write(buf)
        && buf.write_bool(reliable)
        && if reliable {
            match u8::try_from(len) {
                Ok(len) => buf.write_u8(len),
                Err(_) => {
                    buf.set_overflowed();
                    false
                }
            }
        } else {
            match u16::try_from(len) {
                Ok(len) => buf.write_u8(count) && buf.write_u16(len),
                Err(_) => {
                    buf.set_overflowed();
                    false
                }
            }
        };

    header_ok && buf.write_bits_from(scratch)
}

/// Reads a sound record body (kind already consumed).
///
/// Reliable records carry no count; events are read until the payload holds
/// fewer bits than the smallest possible event.
pub fn read_sound_batch(reader: &mut BitReader<'_>) -> Option<SoundBatch> {
    let reliable = reader.read_bool()?;
    let (count, len) = if reliable {
        (None, usize::from(reader.read_u8()?))
    } else {
        (Some(reader.read_u8()?), usize::from(reader.read_u16()?))
    };

    let bytes = reader.read_bytes(len)?;
    let mut payload = BitReader::new(&bytes);
    let mut events = Vec::new();
    let mut prev = SoundEvent::BASELINE;

    loop {
        let more = match count {
            Some(count) => events.len() < usize::from(count),
            None => payload.bits_left() >= FIELD_COUNT,
        };
        if !more {
            break;
        }
        let event = SoundEvent::read_delta(&prev, &mut payload)?;
        events.push(event);
        prev = event;
    }

    Some(SoundBatch { reliable, events })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(buf: &BitWriter) -> SoundBatch {
        let mut reader = BitReader::with_bit_len(buf.as_slice(), buf.bits_written());
        assert_eq!(reader.read_bits(6), Some(RecordKind::Sounds as u32));
        read_sound_batch(&mut reader).unwrap()
    }

    #[test]
    fn test_unchanged_event_costs_ten_bits() {
        let mut buf = BitWriter::new(8);
        assert!(SoundEvent::BASELINE.write_delta(&SoundEvent::BASELINE, &mut buf));
        assert_eq!(buf.bits_written(), FIELD_COUNT);
    }

    #[test]
    fn test_unreliable_batch() {
        let events: Vec<_> = (0..5)
            .map(|i| SoundEvent {
                origin: [i * 10, -i, 0],
                ..SoundEvent::new(1, 40 + i as u16)
            })
            .collect();

        let mut buf = BitWriter::new(512);
        let mut scratch = BitWriter::new(512);
        assert!(write_sound_batch(&mut buf, &mut scratch, &events, false));

        let batch = decode(&buf);
        assert!(!batch.reliable);
        assert_eq!(batch.events, events);
    }

    #[test]
    fn test_reliable_batch_without_count() {
        let events = vec![SoundEvent::BASELINE, SoundEvent::new(3, 9)];

        let mut buf = BitWriter::new(512);
        let mut scratch = BitWriter::new(512);
        assert!(write_sound_batch(&mut buf, &mut scratch, &events, true));

        let batch = decode(&buf);
        assert!(batch.reliable);
        assert_eq!(batch.events, events);
    }

    #[test]
    fn test_reliable_length_limit() {
        // Every field changes on every event: well over 255 bytes
        let events: Vec<_> = (0..40u16)
            .map(|i| SoundEvent {
                entity: i + 1,
                channel: 1 + (i % 7) as u8,
                volume: 10 + i as u8,
                pitch: 50 + i as u8,
                flags: 1,
                origin: [i32::from(i) + 1; 3],
                delay_ms: i + 1,
                sound_index: i + 100,
            })
            .collect();

        let mut buf = BitWriter::new(4096);
        let mut scratch = BitWriter::new(4096);
        assert!(!write_sound_batch(&mut buf, &mut scratch, &events, true));
        assert!(buf.is_overflowed());

        let mut buf = BitWriter::new(4096);
        assert!(write_sound_batch(&mut buf, &mut scratch, &events, false));
        assert_eq!(decode(&buf).events, events);
    }

    #[test]
    fn test_scratch_exhaustion_flags_packet() {
        let events = vec![SoundEvent::new(1, 1); 20];
        let mut buf = BitWriter::new(512);
        let mut scratch = BitWriter::new(4);
        assert!(!write_sound_batch(&mut buf, &mut scratch, &events, false));
        assert!(buf.is_overflowed());
    }
}
