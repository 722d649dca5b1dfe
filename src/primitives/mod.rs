//! Bit-level building blocks with no knowledge of conversations.
//!
//! - `bits`: MSB-first `BitWriter` / `BitReader`
//! - `varint`: unsigned LEB128
//! - `sixbit`: 64-symbol text packing with escape fallback
//! - `turns`: speaker turn bitmap and generic flag bitmaps

pub mod bits;
pub mod sixbit;
pub mod turns;
pub mod varint;

use thiserror::Error;

pub use bits::{BitReader, BitWriter};
pub use sixbit::{
    is_sixbit_char, pack_sixbit, packed_len, sixbit_ratio, unpack_sixbit, EscapeDecoding,
    SixBitPacked, ALPHABET, ESCAPE,
};
pub use turns::{
    bitmap_len, decode_turn_bitmap, encode_turn_bitmap, pack_flags, unpack_flags, TurnBitmap,
};
pub use varint::{decode_varint, encode_varint, varint_len, write_varint, MAX_VARINT_LEN};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("Unexpected end of input at offset {offset} ({needed} more byte(s) needed)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("Varint not terminated before end of input at offset {offset}")]
    VarintUnterminated { offset: usize },

    #[error("Varint overflows 64 bits at offset {offset}")]
    VarintOverflow { offset: usize },

    #[error("Unpacked text is not valid UTF-8 (valid up to byte {offset})")]
    InvalidUtf8 { offset: usize },
}

impl PrimitiveError {
    /// Rebase a slice-relative offset onto the enclosing buffer.
    pub fn at(self, base: usize) -> Self {
        match self {
            PrimitiveError::UnexpectedEof { offset, needed } => PrimitiveError::UnexpectedEof {
                offset: base + offset,
                needed,
            },
            PrimitiveError::VarintUnterminated { offset } => PrimitiveError::VarintUnterminated {
                offset: base + offset,
            },
            PrimitiveError::VarintOverflow { offset } => PrimitiveError::VarintOverflow {
                offset: base + offset,
            },
            PrimitiveError::InvalidUtf8 { offset } => PrimitiveError::InvalidUtf8 {
                offset: base + offset,
            },
        }
    }
}
