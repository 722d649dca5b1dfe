/// MSB-first bit cursor shared by every packer in the codec.
///
/// The six-bit text packer and both bitmaps write through `BitWriter` and read
/// through `BitReader`, so the bit order convention lives in exactly one place:
/// the first value written occupies the highest bits of the first byte.
use crate::primitives::PrimitiveError;

// ---------------------------------------------------------------------------
// BitWriter
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    /// Bits already used in the last byte (0 = byte-aligned).
    bit_offset: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        BitWriter {
            bytes: Vec::with_capacity(bytes),
            bit_offset: 0,
        }
    }

    /// Append the low `width` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, width: u8) {
        debug_assert!(width <= 32);
        for shift in (0..width).rev() {
            self.write_bit((value >> shift) & 1 == 1);
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        if self.bit_offset == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> self.bit_offset;
        }
        self.bit_offset = (self.bit_offset + 1) % 8;
    }

    /// Total number of bits written so far.
    pub fn bit_len(&self) -> usize {
        match self.bit_offset {
            0 => self.bytes.len() * 8,
            used => (self.bytes.len() - 1) * 8 + used as usize,
        }
    }

    /// Finish writing. The trailing partial byte is zero-filled.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ---------------------------------------------------------------------------
// BitReader
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_index: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_index: 0,
            bit_offset: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, PrimitiveError> {
        let byte = *self
            .data
            .get(self.byte_index)
            .ok_or(PrimitiveError::UnexpectedEof {
                offset: self.byte_index,
                needed: 1,
            })?;
        let bit = byte & (0x80 >> self.bit_offset) != 0;
        self.bit_offset += 1;
        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_index += 1;
        }
        Ok(bit)
    }

    /// Read `width` bits as an unsigned value, most significant first.
    pub fn read_bits(&mut self, width: u8) -> Result<u32, PrimitiveError> {
        debug_assert!(width <= 32);
        let mut value = 0u32;
        for _ in 0..width {
            value = (value << 1) | self.read_bit()? as u32;
        }
        Ok(value)
    }

    /// Bytes touched so far, counting a partially read byte as consumed.
    pub fn bytes_consumed(&self) -> usize {
        if self.bit_offset == 0 {
            self.byte_index
        } else {
            self.byte_index + 1
        }
    }
}
