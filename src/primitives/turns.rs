/// Flag bitmaps: the Duo-mode speaker turn bitmap and the entry-type bitmap.
///
/// Both are one bit per item, MSB-first, `ceil(n / 8)` bytes, zero-filled.
use crate::primitives::bits::{BitReader, BitWriter};
use crate::primitives::PrimitiveError;

/// Bytes needed for `count` one-bit flags.
#[inline]
pub fn bitmap_len(count: usize) -> usize {
    count.div_ceil(8)
}

pub fn pack_flags<I>(flags: I) -> Vec<u8>
where
    I: IntoIterator<Item = bool>,
{
    let mut w = BitWriter::new();
    for flag in flags {
        w.write_bit(flag);
    }
    w.into_bytes()
}

/// Read `count` flags from the front of `data`.
pub fn unpack_flags(data: &[u8], count: usize) -> Result<Vec<bool>, PrimitiveError> {
    let needed = bitmap_len(count);
    if needed > data.len() {
        return Err(PrimitiveError::UnexpectedEof {
            offset: data.len(),
            needed: needed - data.len(),
        });
    }
    let mut r = BitReader::new(&data[..needed]);
    (0..count).map(|_| r.read_bit()).collect()
}

// ---------------------------------------------------------------------------
// Turn bitmap
// ---------------------------------------------------------------------------

/// Speaker sequence of a two-party conversation, one bit per message.
///
/// Bit `1` = same speaker as the previous message, `0` = the other speaker.
/// The first message has no predecessor; its speaker travels in
/// `first_speaker` and its bit is always `1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnBitmap {
    pub first_speaker: u8,
    pub bits: Vec<u8>,
}

/// Encode a speaker sequence over `{0, 1}`.
pub fn encode_turn_bitmap(speakers: &[u8]) -> TurnBitmap {
    let first_speaker = speakers.first().copied().unwrap_or(0);
    let mut previous = first_speaker;
    let bits = pack_flags(speakers.iter().map(|&s| {
        let same = s == previous;
        previous = s;
        same
    }));
    TurnBitmap {
        first_speaker,
        bits,
    }
}

/// Rebuild `count` speakers, toggling between 0 and 1 on every `0` bit.
pub fn decode_turn_bitmap(
    first_speaker: u8,
    bits: &[u8],
    count: usize,
) -> Result<Vec<u8>, PrimitiveError> {
    let mut current = first_speaker;
    unpack_flags(bits, count).map(|flags| {
        flags
            .into_iter()
            .map(|same| {
                if !same {
                    current = if current == 0 { 1 } else { 0 };
                }
                current
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_layout() {
        let bytes = pack_flags([false, true, true, false, false, false, false, false, true]);
        assert_eq!(bytes, vec![0b0110_0000, 0b1000_0000]);
        assert_eq!(bitmap_len(9), 2);
        assert_eq!(
            unpack_flags(&bytes, 9).unwrap(),
            vec![false, true, true, false, false, false, false, false, true]
        );
    }

    #[test]
    fn test_unpack_flags_short_input() {
        assert!(unpack_flags(&[0xFF], 9).is_err());
        assert!(unpack_flags(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_turn_bitmap_alternating() {
        let speakers = [1u8, 0, 1, 1, 0];
        let turns = encode_turn_bitmap(&speakers);
        assert_eq!(turns.first_speaker, 1);
        assert_eq!(turns.bits, vec![0b1001_0000]);
        assert_eq!(decode_turn_bitmap(1, &turns.bits, 5).unwrap(), speakers);
    }

    #[test]
    fn test_turn_bitmap_empty() {
        let turns = encode_turn_bitmap(&[]);
        assert_eq!(turns.first_speaker, 0);
        assert!(turns.bits.is_empty());
        assert!(decode_turn_bitmap(0, &[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_turn_bitmap_roundtrip_lengths() {
        // Deterministic pseudo-random speaker runs of every length 0..=1000.
        let mut state = 0x2545_F491u32;
        for len in 0..=1000usize {
            let speakers: Vec<u8> = (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    (state & 1) as u8
                })
                .collect();
            let turns = encode_turn_bitmap(&speakers);
            assert_eq!(turns.bits.len(), bitmap_len(len));
            let decoded = decode_turn_bitmap(turns.first_speaker, &turns.bits, len).unwrap();
            assert_eq!(decoded, speakers, "length {}", len);
        }
    }
}
