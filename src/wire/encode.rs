//! Wire encoder: `Conversation` → bytes, with capacity-driven truncation.
//!
//! Layout after the header (see `header.rs`):
//! ```text
//! participants: [varint name_len][name bytes] * participant_count
//! Duo:   [entry type bitmap][first speaker:1][turn bitmap][payloads...]
//! Group: ([varint speaker+1][text] | [varint 0][event:1]) * entry_count
//! ```
//! Message text is `[varint len][utf8 bytes]` or `[varint units][six-bit run]`.
//! The entry block runs to the end of the buffer.
//!
//! When the full encoding exceeds `max_bytes`, the oldest entries are dropped:
//! a binary search finds the longest suffix of the entry stream that fits,
//! keeping every participant. Sizes are predicted exactly without encoding, so
//! the search costs O(n log n) arithmetic and one final encode.
use thiserror::Error;

use crate::lifecycle::{validate, ValidationError};
use crate::primitives::{
    bitmap_len, encode_turn_bitmap, pack_flags, pack_sixbit, packed_len, varint_len, write_varint,
};
use crate::protocol::{
    Conversation, ConversationEntry, Mode, TextEncoding, DEFAULT_MAX_BYTES, PROTOCOL_VERSION,
};
use crate::wire::header::Header;
use crate::wire::GROUP_EVENT_TAG;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Conversation is not encodable: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Header and participants need {needed} bytes, budget is {max}")]
    CapacityExhausted { needed: usize, max: usize },
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Caller-facing encoder configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeOptions {
    /// Force a text encoding. `None` lets the encoder choose.
    pub text_encoding: Option<TextEncoding>,
    /// Size budget of the output, in bytes.
    pub max_bytes: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            text_encoding: None,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl EncodeOptions {
    pub fn with_text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.text_encoding = Some(encoding);
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

/// Output of [`encode`], with what the truncation search decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub text_encoding: TextEncoding,
    /// Entries kept, always the most recent ones.
    pub retained_entries: usize,
    /// Oldest entries dropped to meet the budget.
    pub dropped_entries: usize,
}

// ---------------------------------------------------------------------------
// Text encoding selection
// ---------------------------------------------------------------------------

/// Resolve the text encoding to write.
///
/// A forced Utf8 or SixBit is honoured. Reserved encodings fall back to Utf8.
/// Otherwise SixBit is chosen when more than 90% of message characters are in
/// the six-bit alphabet.
pub fn select_text_encoding(conv: &Conversation, requested: Option<TextEncoding>) -> TextEncoding {
    match requested {
        Some(encoding) if encoding.is_implemented() => encoding,
        Some(reserved) => {
            log::warn!(
                "text encoding {} is reserved, falling back to utf8",
                reserved.as_str()
            );
            TextEncoding::Utf8
        }
        None => conv.preferred_text_encoding(),
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `conv` within `options.max_bytes`, returning only the bytes.
pub fn serialize(conv: &Conversation, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    encode(conv, options).map(|encoded| encoded.bytes)
}

/// Encode `conv` within `options.max_bytes`.
///
/// Fails with `CapacityExhausted` only when the header and participant list
/// alone exceed the budget; otherwise the result may hold zero entries.
pub fn encode(conv: &Conversation, options: &EncodeOptions) -> Result<Encoded, EncodeError> {
    validate(conv)?;
    let text_encoding = select_text_encoding(conv, options.text_encoding);
    let layout = Layout {
        conv,
        text_encoding,
    };

    let total = conv.entries.len();
    let retained = if layout.len(0) <= options.max_bytes {
        total
    } else {
        let empty = layout.len(total);
        if empty > options.max_bytes {
            return Err(EncodeError::CapacityExhausted {
                needed: empty,
                max: options.max_bytes,
            });
        }
        // Invariant: keeping `lo` entries fits, keeping `hi` does not.
        let (mut lo, mut hi) = (0usize, total);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if layout.len(total - mid) <= options.max_bytes {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        log::debug!(
            "truncated conversation to {} of {} entries for a {} byte budget",
            lo,
            total,
            options.max_bytes
        );
        lo
    };

    let dropped = total - retained;
    let bytes = layout.write(dropped);
    debug_assert_eq!(bytes.len(), layout.len(dropped));
    Ok(Encoded {
        bytes,
        text_encoding,
        retained_entries: retained,
        dropped_entries: dropped,
    })
}

/// Exact size of the untruncated encoding.
pub fn encoded_len(
    conv: &Conversation,
    text_encoding: Option<TextEncoding>,
) -> Result<usize, EncodeError> {
    validate(conv)?;
    let layout = Layout {
        conv,
        text_encoding: select_text_encoding(conv, text_encoding),
    };
    Ok(layout.len(0))
}

/// Size of one message body as written under `encoding`.
pub fn text_len(text: &str, encoding: TextEncoding) -> usize {
    let body = match encoding {
        TextEncoding::SixBit => packed_len(text),
        _ => text.len(),
    };
    varint_len(text.len() as u64) + body
}

/// A validated conversation paired with its resolved text encoding.
///
/// `len(skip)` and `write(skip)` describe the same bytes: the conversation
/// with its `skip` oldest entries removed.
struct Layout<'a> {
    conv: &'a Conversation,
    text_encoding: TextEncoding,
}

impl Layout<'_> {
    fn header(&self, entry_count: usize) -> Header {
        Header {
            version: PROTOCOL_VERSION,
            mode: self.conv.mode,
            text_encoding: self.text_encoding,
            participant_count: self.conv.participants.len(),
            entry_count,
        }
    }

    fn entries(&self, skip: usize) -> &[ConversationEntry] {
        &self.conv.entries[skip..]
    }

    fn len(&self, skip: usize) -> usize {
        let entries = self.entries(skip);
        let participants: usize = self
            .conv
            .participants
            .iter()
            .map(|p| varint_len(p.name.len() as u64) + p.name.len())
            .sum();
        let payloads: usize = entries
            .iter()
            .map(|entry| match entry {
                ConversationEntry::ChatMessage { text, .. } => text_len(text, self.text_encoding),
                ConversationEntry::SystemEvent { .. } => 1,
            })
            .sum();
        let speakers = match self.conv.mode {
            Mode::Duo => {
                let messages = entries.iter().filter(|e| e.is_message()).count();
                bitmap_len(entries.len()) + 1 + bitmap_len(messages)
            }
            _ => entries
                .iter()
                .map(|entry| match entry {
                    ConversationEntry::ChatMessage { speaker, .. } => {
                        varint_len(*speaker as u64 + 1)
                    }
                    ConversationEntry::SystemEvent { .. } => 1,
                })
                .sum(),
        };
        self.header(entries.len()).encoded_len() + participants + speakers + payloads
    }

    fn write(&self, skip: usize) -> Vec<u8> {
        let entries = self.entries(skip);
        let mut out = Vec::with_capacity(self.len(skip));
        self.header(entries.len()).write(&mut out);

        for participant in &self.conv.participants {
            write_varint(&mut out, participant.name.len() as u64);
            out.extend_from_slice(participant.name.as_bytes());
        }

        match self.conv.mode {
            Mode::Duo => {
                out.extend(pack_flags(entries.iter().map(|e| !e.is_message())));
                let speakers: Vec<u8> = entries
                    .iter()
                    .filter_map(|entry| match entry {
                        ConversationEntry::ChatMessage { speaker, .. } => Some(*speaker as u8),
                        ConversationEntry::SystemEvent { .. } => None,
                    })
                    .collect();
                let turns = encode_turn_bitmap(&speakers);
                out.push(turns.first_speaker);
                out.extend(turns.bits);
                for entry in entries {
                    self.write_payload(&mut out, entry);
                }
            }
            _ => {
                for entry in entries {
                    let tag = match entry {
                        ConversationEntry::ChatMessage { speaker, .. } => *speaker + 1,
                        ConversationEntry::SystemEvent { .. } => GROUP_EVENT_TAG,
                    };
                    write_varint(&mut out, tag as u64);
                    self.write_payload(&mut out, entry);
                }
            }
        }
        out
    }

    fn write_payload(&self, out: &mut Vec<u8>, entry: &ConversationEntry) {
        match entry {
            ConversationEntry::ChatMessage { text, .. } => {
                write_varint(out, text.len() as u64);
                match self.text_encoding {
                    TextEncoding::SixBit => out.extend(pack_sixbit(text).bytes),
                    _ => out.extend_from_slice(text.as_bytes()),
                }
            }
            ConversationEntry::SystemEvent { event, participant } => {
                out.push((*event as u8) << 4 | (*participant as u8 & 0x0F));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{create, join, leave, post_message};
    use crate::wire::deserialize;
    use hex_literal::hex;

    fn utf8() -> EncodeOptions {
        EncodeOptions::default().with_text_encoding(TextEncoding::Utf8)
    }

    fn duo() -> Conversation {
        let mut conv = create("a").unwrap();
        join(&mut conv, "b").unwrap();
        post_message(&mut conv, 0, "hi").unwrap();
        post_message(&mut conv, 1, "yo").unwrap();
        conv
    }

    fn long_duo(messages: usize) -> Conversation {
        let mut conv = create("alice").unwrap();
        join(&mut conv, "bob").unwrap();
        for i in 0..messages {
            post_message(&mut conv, i % 2, &format!("message number {}", i + 1)).unwrap();
        }
        conv
    }

    #[test]
    fn test_duo_golden_bytes() {
        let bytes = serialize(&duo(), &utf8()).unwrap();
        assert_eq!(
            bytes,
            hex!("42 04 01 61 01 62 c0 00 80 00 01 02 68 69 02 79 6f").to_vec()
        );
    }

    #[test]
    fn test_group_golden_bytes() {
        let mut conv = create("a").unwrap();
        join(&mut conv, "b").unwrap();
        join(&mut conv, "c").unwrap();
        post_message(&mut conv, 2, "ok").unwrap();
        leave(&mut conv, 0).unwrap();

        let bytes = serialize(&conv, &utf8()).unwrap();
        assert_eq!(
            bytes,
            hex!("53 03 05 01 61 01 62 01 63 00 00 00 01 00 02 03 02 6f 6b 00 10").to_vec()
        );
    }

    #[test]
    fn test_predicted_len_matches_output() {
        let conv = long_duo(37);
        for encoding in [TextEncoding::Utf8, TextEncoding::SixBit] {
            let options = EncodeOptions::default()
                .with_text_encoding(encoding)
                .with_max_bytes(usize::MAX);
            let bytes = serialize(&conv, &options).unwrap();
            assert_eq!(bytes.len(), encoded_len(&conv, Some(encoding)).unwrap());
        }
    }

    #[test]
    fn test_auto_selection() {
        let conv = duo();
        assert_eq!(select_text_encoding(&conv, None), TextEncoding::SixBit);

        let mut shouty = create("a").unwrap();
        post_message(&mut shouty, 0, "HELLO THERE").unwrap();
        assert_eq!(select_text_encoding(&shouty, None), TextEncoding::Utf8);

        // Exactly 90% is not enough.
        let mut edge = create("a").unwrap();
        post_message(&mut edge, 0, "abcdefghiJ").unwrap();
        assert_eq!(select_text_encoding(&edge, None), TextEncoding::Utf8);

        // No messages at all: nothing to gain from six-bit.
        assert_eq!(
            select_text_encoding(&create("a").unwrap(), None),
            TextEncoding::Utf8
        );
    }

    #[test]
    fn test_reserved_encoding_falls_back() {
        let conv = duo();
        for reserved in [TextEncoding::Huffman, TextEncoding::Deflate] {
            let encoded =
                encode(&conv, &EncodeOptions::default().with_text_encoding(reserved)).unwrap();
            assert_eq!(encoded.text_encoding, TextEncoding::Utf8);
            let decoded = deserialize(&encoded.bytes).unwrap();
            assert_eq!(decoded.text_encoding, TextEncoding::Utf8);
            assert_eq!(decoded.participants, conv.participants);
            assert_eq!(decoded.entries, conv.entries);
        }
    }

    #[test]
    fn test_alice_bob_scenario() {
        let mut conv = create("alice").unwrap();
        join(&mut conv, "bob").unwrap();
        post_message(&mut conv, 0, "hey bob").unwrap();
        post_message(&mut conv, 1, "hi alice!").unwrap();
        post_message(&mut conv, 0, "how are you?").unwrap();

        let bytes = serialize(&conv, &EncodeOptions::default()).unwrap();
        // 12 header+names, 3 bitmaps/speaker, 2 events, 7 + 8 + 10 text.
        assert_eq!(bytes.len(), 42);

        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded.text_encoding, TextEncoding::SixBit);
        let names: Vec<&str> = decoded.participants.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(
            decoded.entries,
            vec![
                ConversationEntry::enter(0),
                ConversationEntry::enter(1),
                ConversationEntry::message(0, "hey bob"),
                ConversationEntry::message(1, "hi alice!"),
                ConversationEntry::message(0, "how are you?"),
            ]
        );
    }

    #[test]
    fn test_hundred_messages_truncated_to_budget() {
        let conv = long_duo(100);
        let encoded = encode(&conv, &EncodeOptions::default().with_max_bytes(500)).unwrap();
        assert!(encoded.bytes.len() <= 500);
        assert!(encoded.dropped_entries > 0);

        let decoded = deserialize(&encoded.bytes).unwrap();
        assert!(decoded.entries.len() < 100);
        assert!(!decoded.entries.is_empty());
        assert_eq!(
            decoded.entries.last(),
            Some(&ConversationEntry::message(1, "message number 100"))
        );
    }

    #[test]
    fn test_truncation_keeps_suffix_and_participants() {
        let mut conv = long_duo(40);
        leave(&mut conv, 1).unwrap();
        let full = serialize(&conv, &utf8().with_max_bytes(usize::MAX)).unwrap();

        let mut previous_retained = 0;
        for max in (20..full.len()).step_by(7) {
            let encoded = encode(&conv, &utf8().with_max_bytes(max)).unwrap();
            assert!(encoded.bytes.len() <= max);

            let decoded = deserialize(&encoded.bytes).unwrap();
            assert_eq!(decoded.participants.len(), 2);
            assert_eq!(decoded.entries, conv.entries[encoded.dropped_entries..]);
            // Looser budgets never keep fewer entries.
            assert!(encoded.retained_entries >= previous_retained);
            previous_retained = encoded.retained_entries;
        }
    }

    #[test]
    fn test_truncation_is_maximal() {
        let conv = long_duo(60);
        let options = EncodeOptions::default().with_max_bytes(300);
        let encoded = encode(&conv, &options).unwrap();

        // One more entry would not have fit.
        let mut one_more = conv.clone();
        one_more.entries.drain(..encoded.dropped_entries - 1);
        assert!(encoded_len(&one_more, Some(encoded.text_encoding)).unwrap() > 300);
    }

    #[test]
    fn test_degrades_to_zero_entries() {
        let conv = long_duo(3);
        let empty = {
            let mut c = conv.clone();
            c.entries.clear();
            serialize(&c, &utf8().with_max_bytes(usize::MAX)).unwrap()
        };
        let encoded = encode(&conv, &utf8().with_max_bytes(empty.len())).unwrap();
        assert_eq!(encoded.retained_entries, 0);
        assert_eq!(encoded.bytes, empty);

        let decoded = deserialize(&encoded.bytes).unwrap();
        assert_eq!(decoded.participants.len(), 2);
        assert!(decoded.participants.iter().all(|p| !p.active));
    }

    #[test]
    fn test_capacity_exhausted() {
        let conv = long_duo(3);
        assert_eq!(
            serialize(&conv, &utf8().with_max_bytes(5)),
            Err(EncodeError::CapacityExhausted { needed: 13, max: 5 })
        );
    }

    #[test]
    fn test_sixbit_not_larger_than_utf8() {
        let conv = long_duo(25);
        let six = serialize(
            &conv,
            &EncodeOptions::default().with_text_encoding(TextEncoding::SixBit),
        )
        .unwrap();
        let plain = serialize(&conv, &utf8()).unwrap();
        assert!(six.len() <= plain.len());
    }

    #[test]
    fn test_invalid_conversation_rejected() {
        let mut conv = duo();
        conv.entries.push(ConversationEntry::message(9, "ghost"));
        assert!(matches!(
            serialize(&conv, &EncodeOptions::default()),
            Err(EncodeError::Invalid(ValidationError::ParticipantOutOfRange { .. }))
        ));
    }
}
