//! # Tick Record

use fanout_core::{BitReader, BitWriter, TickTiming};

use super::RecordKind;

/// Scale applied to frame times before they are sent as 16-bit integers.
const FRAMETIME_SCALE: f32 = 100_000.0;

/// Tick metadata sent first in every snapshot packet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NetTick {
    /// Server tick.
    pub tick: u32,
    /// Host frame timing.
    pub timing: TickTiming,
}

impl NetTick {
    /// Creates a tick record.
    #[must_use]
    pub const fn new(tick: u32, timing: TickTiming) -> Self {
        Self { tick, timing }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn scale(seconds: f32) -> u32 {
        // Saturating float-to-int cast, clamped to the 16-bit field
        ((seconds * FRAMETIME_SCALE) as u32).min(u32::from(u16::MAX))
    }

    /// Writes the record, kind included.
    pub fn write(&self, buf: &mut BitWriter) -> bool {
        RecordKind::Tick.write(buf)
            && buf.write_u32(self.tick)
            && buf.write_bits(Self::scale(self.timing.host_frametime), 16)
            && buf.write_bits(Self::scale(self.timing.host_frametime_stddev), 16)
    }

    /// Reads the record body (kind already consumed).
    pub fn read(reader: &mut BitReader<'_>) -> Option<Self> {
        let tick = reader.read_u32()?;
        let frametime = f32::from(reader.read_u16()?) / FRAMETIME_SCALE;
        let stddev = f32::from(reader.read_u16()?) / FRAMETIME_SCALE;
        Some(Self {
            tick,
            timing: TickTiming {
                host_frametime: frametime,
                host_frametime_stddev: stddev,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_record_layout() {
        let mut buf = BitWriter::new(16);
        let record = NetTick::new(
            77,
            TickTiming {
                host_frametime: 0.015,
                host_frametime_stddev: 0.0001,
            },
        );
        assert!(record.write(&mut buf));
        assert_eq!(buf.bits_written(), 6 + 32 + 16 + 16);

        let mut reader = BitReader::new(buf.as_slice());
        assert_eq!(reader.read_bits(6), Some(RecordKind::Tick as u32));
        let decoded = NetTick::read(&mut reader).unwrap();
        assert_eq!(decoded.tick, 77);
        assert!((decoded.timing.host_frametime - 0.015).abs() < 1e-4);
    }

    #[test]
    fn test_frametime_saturates() {
        let mut buf = BitWriter::new(16);
        let record = NetTick::new(
            1,
            TickTiming {
                host_frametime: 10.0,
                host_frametime_stddev: -1.0,
            },
        );
        assert!(record.write(&mut buf));

        let mut reader = BitReader::new(buf.as_slice());
        reader.read_bits(6);
        let decoded = NetTick::read(&mut reader).unwrap();
        assert!((decoded.timing.host_frametime - 0.65535).abs() < 1e-4);
        assert_eq!(decoded.timing.host_frametime_stddev, 0.0);
    }

    #[test]
    fn test_tick_record_needs_room() {
        let mut buf = BitWriter::new(4);
        assert!(!NetTick::default().write(&mut buf));
        assert!(buf.is_overflowed());
    }
}
