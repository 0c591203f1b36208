//! # Bit Reader
//!
//! Mirror of [`super::BitWriter`], used to decode packets on the receiving
//! side and to verify wire layouts in tests.

/// Bit reader over a borrowed byte slice.
pub struct BitReader<'a> {
    buffer: &'a [u8],
    bit_position: usize,
    bit_len: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a reader over all bits of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            bit_position: 0,
            bit_len: buffer.len() * 8,
        }
    }

    /// Creates a reader limited to the first `bit_len` bits.
    #[must_use]
    pub fn with_bit_len(buffer: &'a [u8], bit_len: usize) -> Self {
        Self {
            buffer,
            bit_position: 0,
            bit_len: bit_len.min(buffer.len() * 8),
        }
    }

    /// Number of bits consumed.
    #[inline]
    #[must_use]
    pub const fn bits_read(&self) -> usize {
        self.bit_position
    }

    /// Number of bits remaining.
    #[inline]
    #[must_use]
    pub const fn bits_left(&self) -> usize {
        self.bit_len - self.bit_position
    }

    /// Reads `bits` bits (1-32).
    pub fn read_bits(&mut self, bits: u8) -> Option<u32> {
        debug_assert!(bits > 0 && bits <= 32);

        if usize::from(bits) > self.bits_left() {
            return None;
        }

        let mut value = 0u32;
        for i in 0..usize::from(bits) {
            let byte = self.buffer[self.bit_position / 8];
            let bit = (byte >> (self.bit_position % 8)) & 1;
            value |= u32::from(bit) << i;
            self.bit_position += 1;
        }
        Some(value)
    }

    /// Reads a single bit.
    #[inline]
    pub fn read_bool(&mut self) -> Option<bool> {
        self.read_bits(1).map(|b| b == 1)
    }

    /// Reads a byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_bits(8).and_then(|v| u8::try_from(v).ok())
    }

    /// Reads a u16.
    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_bits(16).and_then(|v| u16::try_from(v).ok())
    }

    /// Reads a u32.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_bits(32)
    }

    /// Reads an i32.
    #[inline]
    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_bits(32).map(|v| i32::from_ne_bytes(v.to_ne_bytes()))
    }

    /// Reads `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Option<Vec<u8>> {
        if len * 8 > self.bits_left() {
            return None;
        }
        (0..len).map(|_| self.read_u8()).collect()
    }

    /// Skips to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let pad = (8 - self.bit_position % 8) % 8;
        self.bit_position = (self.bit_position + pad).min(self.bit_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;

    #[test]
    fn test_reads_what_writer_wrote() {
        let mut writer = BitWriter::new(16);
        writer.write_bits(5, 3);
        writer.write_u16(0xBEEF);
        writer.write_i32(-42);
        writer.write_bool(true);

        let mut reader = BitReader::with_bit_len(writer.as_slice(), writer.bits_written());
        assert_eq!(reader.read_bits(3), Some(5));
        assert_eq!(reader.read_u16(), Some(0xBEEF));
        assert_eq!(reader.read_i32(), Some(-42));
        assert_eq!(reader.read_bool(), Some(true));
        assert_eq!(reader.bits_left(), 0);
        assert_eq!(reader.read_bool(), None);
    }

    #[test]
    fn test_read_past_end() {
        let data = [0xFFu8];
        let mut reader = BitReader::new(&data);
        assert!(reader.read_u16().is_none());
        assert_eq!(reader.read_u8(), Some(0xFF));
    }
}
