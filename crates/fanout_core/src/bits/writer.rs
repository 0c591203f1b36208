//! # Bit Writer
//!
//! Fixed-capacity bit writer. The backing storage is allocated once and
//! reused for every packet built with it.

/// Fixed-capacity bit writer with a sticky overflow flag.
///
/// A write that does not fit leaves the buffer untouched, marks it as
/// overflowed and returns `false`. Every later write also returns `false`
/// until [`BitWriter::reset`] is called.
pub struct BitWriter {
    buffer: Box<[u8]>,
    bit_position: usize,
    overflowed: bool,
}

impl BitWriter {
    /// Creates a writer that can hold `capacity_bytes` bytes.
    #[must_use]
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity_bytes].into_boxed_slice(),
            bit_position: 0,
            overflowed: false,
        }
    }

    /// Clears written data and the overflow flag.
    pub fn reset(&mut self) {
        let used = self.bytes_written();
        self.buffer[..used].fill(0);
        self.bit_position = 0;
        self.overflowed = false;
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Total capacity in bits.
    #[inline]
    #[must_use]
    pub fn capacity_bits(&self) -> usize {
        self.buffer.len() * 8
    }

    /// Number of bits written so far.
    #[inline]
    #[must_use]
    pub const fn bits_written(&self) -> usize {
        self.bit_position
    }

    /// Number of bytes touched so far (rounded up).
    #[inline]
    #[must_use]
    pub const fn bytes_written(&self) -> usize {
        self.bit_position.div_ceil(8)
    }

    /// Bits still available.
    #[inline]
    #[must_use]
    pub fn bits_left(&self) -> usize {
        self.capacity_bits() - self.bit_position
    }

    /// Returns true once any write failed to fit.
    #[inline]
    #[must_use]
    pub const fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Flags the buffer as overflowed without writing.
    ///
    /// Used when a record cannot be represented in its length field.
    pub fn set_overflowed(&mut self) {
        self.overflowed = true;
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bit_position == 0
    }

    /// Returns the written bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.bytes_written()]
    }

    fn reserve(&mut self, bits: usize) -> bool {
        if self.overflowed || bits > self.bits_left() {
            self.overflowed = true;
            return false;
        }
        true
    }

    /// Writes the low `bits` bits of `value` (1-32).
    pub fn write_bits(&mut self, value: u32, bits: u8) -> bool {
        debug_assert!(bits > 0 && bits <= 32);

        if !self.reserve(usize::from(bits)) {
            return false;
        }

        let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
        let value = value & mask;

        for i in 0..usize::from(bits) {
            if (value >> i) & 1 == 1 {
                let byte_idx = self.bit_position / 8;
                let bit_idx = self.bit_position % 8;
                self.buffer[byte_idx] |= 1 << bit_idx;
            }
            self.bit_position += 1;
        }

        true
    }

    /// Writes a single bit.
    #[inline]
    pub fn write_bool(&mut self, value: bool) -> bool {
        self.write_bits(u32::from(value), 1)
    }

    /// Writes a byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> bool {
        self.write_bits(u32::from(value), 8)
    }

    /// Writes a u16.
    #[inline]
    pub fn write_u16(&mut self, value: u16) -> bool {
        self.write_bits(u32::from(value), 16)
    }

    /// Writes a u32.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> bool {
        self.write_bits(value, 32)
    }

    /// Writes an i32 as its two's complement bit pattern.
    #[inline]
    pub fn write_i32(&mut self, value: i32) -> bool {
        self.write_bits(u32::from_ne_bytes(value.to_ne_bytes()), 32)
    }

    /// Writes a byte slice. All or nothing.
    ///
    /// On a byte boundary the slice is copied whole.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        if !self.reserve(bytes.len() * 8) {
            return false;
        }
        if self.bit_position % 8 == 0 {
            let start = self.bit_position / 8;
            self.buffer[start..start + bytes.len()].copy_from_slice(bytes);
            self.bit_position += bytes.len() * 8;
            return true;
        }
        bytes.iter().all(|&b| self.write_u8(b))
    }

    /// Appends every bit written to `other`. All or nothing.
    pub fn write_bits_from(&mut self, other: &BitWriter) -> bool {
        let total = other.bits_written();
        if !self.reserve(total) {
            return false;
        }

        let bytes = other.as_slice();
        let full_bytes = total / 8;
        self.write_bytes(&bytes[..full_bytes]);
        let tail = u8::try_from(total % 8).unwrap_or(0);
        if tail > 0 {
            self.write_bits(u32::from(bytes[full_bytes]), tail);
        }
        true
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) -> bool {
        let pad = (8 - self.bit_position % 8) % 8;
        if pad == 0 {
            return !self.overflowed;
        }
        if !self.reserve(pad) {
            return false;
        }
        self.bit_position += pad;
        true
    }
}

impl std::fmt::Debug for BitWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitWriter")
            .field("capacity_bytes", &self.buffer.len())
            .field("bits_written", &self.bit_position)
            .field("overflowed", &self.overflowed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_bits_lsb_first() {
        let mut writer = BitWriter::new(4);

        assert!(writer.write_bits(0b101, 3));
        assert!(writer.write_bits(0b1111, 4));
        assert!(writer.write_bool(true));

        assert_eq!(writer.bytes_written(), 1);
        assert_eq!(writer.as_slice(), &[0b1111_1101]);
    }

    #[test]
    fn test_overflow_is_sticky() {
        let mut writer = BitWriter::new(2);

        assert!(writer.write_u8(1));
        assert!(!writer.write_u16(0xFFFF));
        assert!(writer.is_overflowed());

        // Fits on its own, but the buffer has already overflowed
        assert!(!writer.write_bool(true));
        assert_eq!(writer.bits_written(), 8);

        writer.reset();
        assert!(!writer.is_overflowed());
        assert!(writer.is_empty());
        assert!(writer.write_u16(0xFFFF));
    }

    #[test]
    fn test_reset_clears_stale_bits() {
        let mut writer = BitWriter::new(1);
        writer.write_u8(0xFF);
        writer.reset();

        writer.write_bits(0, 8);
        assert_eq!(writer.as_slice(), &[0]);
    }

    #[test]
    fn test_write_bits_from_unaligned() {
        let mut inner = BitWriter::new(4);
        inner.write_bits(0b1_0110, 5);
        inner.write_u8(0xA5);

        let mut outer = BitWriter::new(8);
        outer.write_bits(0b11, 2);
        assert!(outer.write_bits_from(&inner));
        assert_eq!(outer.bits_written(), 2 + 13);
    }

    #[test]
    fn test_write_bytes_all_or_nothing() {
        let mut writer = BitWriter::new(3);
        writer.write_u8(7);

        assert!(!writer.write_bytes(&[1, 2, 3]));
        assert_eq!(writer.bits_written(), 8);
        assert!(writer.is_overflowed());
    }

    #[test]
    fn test_write_bytes_aligned_and_unaligned() {
        let payload = [0xA5, 0x00, 0xFF, 0x3C, 0x81];

        let mut aligned = BitWriter::new(16);
        aligned.write_u8(0x11);
        assert!(aligned.write_bytes(&payload));
        assert_eq!(aligned.bits_written(), 48);
        assert_eq!(aligned.as_slice(), &[0x11, 0xA5, 0x00, 0xFF, 0x3C, 0x81]);

        // Same bytes three bits in must match a bit-by-bit write
        let mut shifted = BitWriter::new(16);
        shifted.write_bits(0b101, 3);
        assert!(shifted.write_bytes(&payload));
        let mut expected = BitWriter::new(16);
        expected.write_bits(0b101, 3);
        for &b in &payload {
            expected.write_u8(b);
        }
        assert_eq!(shifted.bits_written(), 43);
        assert_eq!(shifted.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_write_bytes_after_reset_overwrites_stale_data() {
        let mut writer = BitWriter::new(4);
        writer.write_u32(u32::MAX);
        writer.reset();
        assert!(writer.write_bytes(&[0x01, 0x02]));
        assert_eq!(writer.as_slice(), &[0x01, 0x02]);
    }

    #[test]
    fn test_align_to_byte() {
        let mut writer = BitWriter::new(2);
        writer.write_bits(1, 3);
        assert!(writer.align_to_byte());
        assert_eq!(writer.bits_written(), 8);
        assert!(writer.align_to_byte());
        assert_eq!(writer.bits_written(), 8);
    }
}
