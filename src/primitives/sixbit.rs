/// Six-bit restricted-alphabet text packing.
///
/// 63 symbols (space, lowercase latin, digits, common punctuation, newline)
/// map to codes 0..=62. Code 63 is the escape sentinel: it is followed by one
/// raw 8-bit byte. Every unit of the packed stream therefore produces exactly
/// one output byte, and the unit count equals the UTF-8 length of the text.
///
/// Wire layout of a packed run:
/// ```text
/// [code:6 | ESC:6 byte:8]* zero-filled to the next byte boundary
/// ```
/// The stream carries no terminator; the caller stores the unit count.
use crate::primitives::bits::{BitReader, BitWriter};
use crate::primitives::PrimitiveError;

/// Escape sentinel code.
pub const ESCAPE: u8 = 63;

/// Symbol table, indexed by code.
pub const ALPHABET: &[u8; 63] =
    b" abcdefghijklmnopqrstuvwxyz0123456789.,!?'\"-:;()/@#&+=*_%$<>[]\n";

const NOT_IN_ALPHABET: u8 = 0xFF;

const CODES: [u8; 256] = build_code_table();

const fn build_code_table() -> [u8; 256] {
    let mut table = [NOT_IN_ALPHABET; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// How escaped bytes are turned back into text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeDecoding {
    /// Escaped bytes are regrouped and validated as UTF-8 (protocol v1).
    Utf8,
    /// Each escaped byte becomes the char of the same value (protocol v0).
    /// Multi-byte characters come back as one Latin-1 char per byte.
    Latin1,
}

/// Result of packing one text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SixBitPacked {
    /// Number of units (one per output byte) the decoder must read.
    pub units: usize,
    pub bytes: Vec<u8>,
}

/// Six-bit code for a single byte, if the byte is in the alphabet.
#[inline]
pub fn sixbit_code(byte: u8) -> Option<u8> {
    match CODES[byte as usize] {
        NOT_IN_ALPHABET => None,
        code => Some(code),
    }
}

pub fn is_sixbit_char(c: char) -> bool {
    c.is_ascii() && sixbit_code(c as u8).is_some()
}

/// Bits a byte costs in the packed stream.
#[inline]
fn unit_bits(byte: u8) -> usize {
    if sixbit_code(byte).is_some() {
        6
    } else {
        6 + 8
    }
}

/// Exact packed size of `text` in bytes, without packing it.
pub fn packed_len(text: &str) -> usize {
    text.bytes().map(unit_bits).sum::<usize>().div_ceil(8)
}

pub fn pack_sixbit(text: &str) -> SixBitPacked {
    let mut w = BitWriter::with_capacity(packed_len(text));
    for byte in text.bytes() {
        match sixbit_code(byte) {
            Some(code) => w.write_bits(code as u32, 6),
            None => {
                w.write_bits(ESCAPE as u32, 6);
                w.write_bits(byte as u32, 8);
            }
        }
    }
    SixBitPacked {
        units: text.len(),
        bytes: w.into_bytes(),
    }
}

/// Unpack `units` units from the front of `data`.
///
/// Returns the text and the number of whole bytes the packed run occupied.
pub fn unpack_sixbit(
    data: &[u8],
    units: usize,
    escapes: EscapeDecoding,
) -> Result<(String, usize), PrimitiveError> {
    // Every unit needs at least six bits.
    if units.saturating_mul(6).div_ceil(8) > data.len() {
        return Err(PrimitiveError::UnexpectedEof {
            offset: data.len(),
            needed: units.saturating_mul(6).div_ceil(8) - data.len(),
        });
    }

    let mut r = BitReader::new(data);
    let text = match escapes {
        EscapeDecoding::Utf8 => {
            let mut out = Vec::with_capacity(units);
            for _ in 0..units {
                let code = r.read_bits(6)? as u8;
                if code == ESCAPE {
                    out.push(r.read_bits(8)? as u8);
                } else {
                    out.push(ALPHABET[code as usize]);
                }
            }
            String::from_utf8(out).map_err(|e| PrimitiveError::InvalidUtf8 {
                offset: e.utf8_error().valid_up_to(),
            })?
        }
        EscapeDecoding::Latin1 => {
            let mut out = String::with_capacity(units);
            for _ in 0..units {
                let code = r.read_bits(6)? as u8;
                if code == ESCAPE {
                    out.push(char::from(r.read_bits(8)? as u8));
                } else {
                    out.push(char::from(ALPHABET[code as usize]));
                }
            }
            out
        }
    };
    Ok((text, r.bytes_consumed()))
}

/// Share of characters in `texts` that fall inside the alphabet.
///
/// Returns 0.0 when there are no characters at all.
pub fn sixbit_ratio<'a, I>(texts: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = 0usize;
    let mut inside = 0usize;
    for text in texts {
        for c in text.chars() {
            total += 1;
            if is_sixbit_char(c) {
                inside += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        inside as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_codes_are_unique() {
        let mut seen = [false; 256];
        for &b in ALPHABET.iter() {
            assert!(!seen[b as usize], "duplicate symbol {:?}", b as char);
            seen[b as usize] = true;
        }
        assert_eq!(sixbit_code(b' '), Some(0));
        assert_eq!(sixbit_code(b'\n'), Some(62));
        assert_eq!(sixbit_code(b'A'), None);
    }

    #[test]
    fn test_four_chars_pack_into_three_bytes() {
        let packed = pack_sixbit("abcd");
        assert_eq!(packed.units, 4);
        assert_eq!(packed.bytes.len(), 3);
        // a=1 b=2 c=3 d=4 -> 000001 000010 000011 000100
        assert_eq!(packed.bytes, vec![0b0000_0100, 0b0010_0000, 0b1100_0100]);
    }

    #[test]
    fn test_roundtrip_plain_text() {
        let text = "hey bob, how's it going? (fine)\nsee you @ 5:30!";
        let packed = pack_sixbit(text);
        assert_eq!(packed.bytes.len(), packed_len(text));
        let (decoded, used) =
            unpack_sixbit(&packed.bytes, packed.units, EscapeDecoding::Utf8).unwrap();
        assert_eq!(decoded, text);
        assert_eq!(used, packed.bytes.len());
    }

    #[test]
    fn test_ascii_escape_roundtrip() {
        let text = "Hello World";
        let packed = pack_sixbit(text);
        // Two uppercase letters cost 14 bits each.
        assert_eq!(packed.bytes.len(), (9 * 6 + 2 * 14usize).div_ceil(8));
        let (decoded, _) =
            unpack_sixbit(&packed.bytes, packed.units, EscapeDecoding::Utf8).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_multibyte_escape_regroups_utf8() {
        let text = "café ☕";
        let packed = pack_sixbit(text);
        assert_eq!(packed.units, text.len());
        let (decoded, _) =
            unpack_sixbit(&packed.bytes, packed.units, EscapeDecoding::Utf8).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_legacy_escape_splits_multibyte() {
        let packed = pack_sixbit("é");
        let (decoded, _) =
            unpack_sixbit(&packed.bytes, packed.units, EscapeDecoding::Latin1).unwrap();
        assert_eq!(decoded, "\u{00C3}\u{00A9}");

        let packed = pack_sixbit("A!");
        let (decoded, _) =
            unpack_sixbit(&packed.bytes, packed.units, EscapeDecoding::Latin1).unwrap();
        assert_eq!(decoded, "A!");
    }

    #[test]
    fn test_unpack_stops_at_unit_count() {
        let mut data = pack_sixbit("abcd").bytes;
        data.extend_from_slice(&[0xAA, 0xBB]);
        let (decoded, used) = unpack_sixbit(&data, 4, EscapeDecoding::Utf8).unwrap();
        assert_eq!(decoded, "abcd");
        assert_eq!(used, 3);
    }

    #[test]
    fn test_unpack_truncated_input() {
        let packed = pack_sixbit("abcdefgh");
        assert!(unpack_sixbit(&packed.bytes[..3], 8, EscapeDecoding::Utf8).is_err());
        // Escape whose raw byte is cut off.
        let packed = pack_sixbit("X");
        assert!(unpack_sixbit(&packed.bytes[..1], 1, EscapeDecoding::Utf8).is_err());
    }

    #[test]
    fn test_ratio() {
        assert_eq!(sixbit_ratio(["abc", "def"]), 1.0);
        assert_eq!(sixbit_ratio(["aB"]), 0.5);
        assert_eq!(sixbit_ratio(Vec::<&str>::new()), 0.0);
        // Counted per character, not per byte.
        assert_eq!(sixbit_ratio(["é"]), 0.0);
    }
}
