//! Fixed header: byte 0 plus the two leading counts.
//!
//! ```text
//! byte 0: [version:2][mode:2][text_encoding:2][participant_hint:2]
//! if participant_hint == 3: varint participant_count
//! varint entry_count
//! ```
//! A hint of 0, 1 or 2 is the participant count itself.
use serde::Serialize;

use crate::primitives::{varint_len, write_varint};
use crate::protocol::{Mode, TextEncoding, MIN_SUPPORTED_VERSION, PROTOCOL_VERSION};
use crate::wire::decode::{ByteReader, DecodeError};

/// Hint value meaning "an explicit varint count follows".
const EXPLICIT_COUNT_HINT: u8 = 3;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub mode: Mode,
    pub text_encoding: TextEncoding,
    pub participant_count: usize,
    pub entry_count: usize,
}

impl Header {
    pub fn write(&self, out: &mut Vec<u8>) {
        let hint = if self.participant_count < EXPLICIT_COUNT_HINT as usize {
            self.participant_count as u8
        } else {
            EXPLICIT_COUNT_HINT
        };
        out.push(
            (self.version & 0b11) << 6
                | (self.mode as u8) << 4
                | (self.text_encoding as u8) << 2
                | hint,
        );
        if hint == EXPLICIT_COUNT_HINT {
            write_varint(out, self.participant_count as u64);
        }
        write_varint(out, self.entry_count as u64);
    }

    /// Bytes `write` will produce.
    pub fn encoded_len(&self) -> usize {
        let explicit = if self.participant_count >= EXPLICIT_COUNT_HINT as usize {
            varint_len(self.participant_count as u64)
        } else {
            0
        };
        1 + explicit + varint_len(self.entry_count as u64)
    }

    /// Parse and check the header. Unknown versions, reserved modes and
    /// reserved text encodings are rejected before anything else is read.
    pub(crate) fn read(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        if r.is_empty() {
            return Err(DecodeError::Empty);
        }
        let byte0 = r.read_u8("header")?;

        let version = byte0 >> 6;
        if !(MIN_SUPPORTED_VERSION..=PROTOCOL_VERSION).contains(&version) {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let mode = Mode::from_bits(byte0 >> 4);
        if !mode.is_implemented() {
            return Err(DecodeError::UnsupportedMode(mode));
        }
        let text_encoding = TextEncoding::from_bits(byte0 >> 2);
        if !text_encoding.is_implemented() {
            return Err(DecodeError::UnsupportedTextEncoding(text_encoding));
        }

        let hint = byte0 & 0b11;
        let participant_count = if hint == EXPLICIT_COUNT_HINT {
            r.read_count("participant count")?
        } else {
            hint as usize
        };
        let entry_count = r.read_count("entry count")?;

        Ok(Header {
            version,
            mode,
            text_encoding,
            participant_count,
            entry_count,
        })
    }
}

/// Read only the header of an encoded conversation.
///
/// Cheap enough to run on every scan before deciding whether to decode.
pub fn peek_header(bytes: &[u8]) -> Result<Header, DecodeError> {
    Header::read(&mut ByteReader::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn header(participants: usize, entries: usize) -> Header {
        Header {
            version: 1,
            mode: Mode::Group,
            text_encoding: TextEncoding::SixBit,
            participant_count: participants,
            entry_count: entries,
        }
    }

    #[test]
    fn test_small_participant_count_uses_hint() {
        let mut out = Vec::new();
        header(2, 5).write(&mut out);
        // 01 01 01 10 | entries=5
        assert_eq!(out, hex!("56 05"));
        assert_eq!(header(2, 5).encoded_len(), 2);
    }

    #[test]
    fn test_large_participant_count_is_explicit() {
        let mut out = Vec::new();
        header(7, 200).write(&mut out);
        assert_eq!(out, hex!("57 07 c8 01"));
        assert_eq!(header(7, 200).encoded_len(), out.len());
        assert_eq!(peek_header(&out).unwrap(), header(7, 200));
    }

    #[test]
    fn test_peek_rejects_unknown_version() {
        // version 3
        assert!(matches!(
            peek_header(&hex!("c0 00")),
            Err(DecodeError::UnsupportedVersion(3))
        ));
        assert!(matches!(
            peek_header(&hex!("80 00")),
            Err(DecodeError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_peek_rejects_reserved_mode_and_encoding() {
        assert!(matches!(
            peek_header(&hex!("60 00")),
            Err(DecodeError::UnsupportedMode(Mode::Solo))
        ));
        assert!(matches!(
            peek_header(&hex!("4c 00")),
            Err(DecodeError::UnsupportedTextEncoding(TextEncoding::Deflate))
        ));
    }

    #[test]
    fn test_peek_accepts_legacy_version() {
        let h = peek_header(&hex!("01 00")).unwrap();
        assert_eq!(h.version, 0);
        assert_eq!(h.participant_count, 1);
    }

    #[test]
    fn test_peek_truncated() {
        assert!(matches!(peek_header(&[]), Err(DecodeError::Empty)));
        assert!(peek_header(&hex!("43")).is_err());
        assert!(peek_header(&hex!("43 05")).is_err());
    }
}
