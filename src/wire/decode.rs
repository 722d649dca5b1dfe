//! Wire decoder: bytes → `Conversation`.
//!
//! Decoding is all-or-nothing. Any structural problem (truncation, unknown
//! version, bad varint, out-of-range index, leftover bytes) fails the whole
//! call with the offset at which it was detected. After the structural pass
//! the entry stream is replayed to rebuild `Participant::active`.
use thiserror::Error;

use crate::primitives::{
    bitmap_len, decode_turn_bitmap, decode_varint, unpack_flags, unpack_sixbit, EscapeDecoding,
    PrimitiveError,
};
use crate::protocol::{
    Conversation, ConversationEntry, EventKind, Mode, Participant, TextEncoding,
    DUO_MAX_PARTICIPANTS, MAX_NAME_BYTES, MAX_PARTICIPANTS,
};
use crate::wire::header::Header;
use crate::wire::GROUP_EVENT_TAG;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty input")]
    Empty,

    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("Unsupported mode {0:?}")]
    UnsupportedMode(Mode),

    #[error("Unsupported text encoding {0:?}")]
    UnsupportedTextEncoding(TextEncoding),

    #[error("Input truncated in {field} at offset {offset}: need {needed} more byte(s)")]
    Truncated {
        offset: usize,
        field: &'static str,
        needed: usize,
    },

    #[error("Malformed {field}: {source}")]
    Primitive {
        field: &'static str,
        #[source]
        source: PrimitiveError,
    },

    #[error("Invalid UTF-8 in {field} at offset {offset}")]
    InvalidUtf8 { offset: usize, field: &'static str },

    #[error("Participant name length {len} at offset {offset} (expected 1..={MAX_NAME_BYTES})")]
    InvalidNameLength { offset: usize, len: u64 },

    #[error("Empty message at offset {offset}")]
    EmptyMessage { offset: usize },

    #[error("Participant index {index} at offset {offset} out of range ({count} participants)")]
    ParticipantOutOfRange {
        offset: usize,
        index: usize,
        count: usize,
    },

    #[error("First speaker {value} at offset {offset} in a duo block without messages")]
    StrayFirstSpeaker { offset: usize, value: u8 },

    #[error("Unknown event kind {kind} at offset {offset}")]
    UnknownEventKind { offset: usize, kind: u8 },

    #[error("{count} participants do not fit mode {mode:?}")]
    TooManyParticipants { count: usize, mode: Mode },

    #[error("Entry count {count} cannot fit in the remaining {available} bytes")]
    EntryCountTooLarge { count: usize, available: usize },

    #[error("{count} unread byte(s) after the last entry at offset {offset}")]
    TrailingBytes { offset: usize, count: usize },
}

// ---------------------------------------------------------------------------
// ByteReader
// ---------------------------------------------------------------------------

/// Forward-only byte cursor that tags every failure with its offset.
#[derive(Clone, Debug)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub(crate) fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        let byte = *self.data.get(self.pos).ok_or(DecodeError::Truncated {
            offset: self.pos,
            field,
            needed: 1,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_bytes(
        &mut self,
        len: usize,
        field: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                field,
                needed: len - self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub(crate) fn read_varint(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let (value, len) = decode_varint(self.rest()).map_err(|e| self.primitive(field, e))?;
        self.pos += len;
        Ok(value)
    }

    /// A varint used as a count or length; anything past `usize` is
    /// certainly larger than the input and reported as truncation.
    pub(crate) fn read_count(&mut self, field: &'static str) -> Result<usize, DecodeError> {
        let offset = self.pos;
        let value = self.read_varint(field)?;
        usize::try_from(value).map_err(|_| DecodeError::Truncated {
            offset,
            field,
            needed: usize::MAX,
        })
    }

    fn primitive(&self, field: &'static str, source: PrimitiveError) -> DecodeError {
        match source.at(self.pos) {
            PrimitiveError::UnexpectedEof { offset, needed } => DecodeError::Truncated {
                offset,
                field,
                needed,
            },
            source => DecodeError::Primitive { field, source },
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a complete conversation.
pub fn deserialize(bytes: &[u8]) -> Result<Conversation, DecodeError> {
    let mut r = ByteReader::new(bytes);
    let header = Header::read(&mut r)?;

    let capacity = match header.mode {
        Mode::Duo => DUO_MAX_PARTICIPANTS,
        _ => MAX_PARTICIPANTS,
    };
    if header.participant_count > capacity {
        return Err(DecodeError::TooManyParticipants {
            count: header.participant_count,
            mode: header.mode,
        });
    }

    let participants = read_participants(&mut r, header.participant_count)?;

    let text = TextReader {
        encoding: header.text_encoding,
        escapes: if header.version == 0 {
            EscapeDecoding::Latin1
        } else {
            EscapeDecoding::Utf8
        },
        participant_count: participants.len(),
    };
    let entries = match header.mode {
        Mode::Duo => read_duo_entries(&mut r, &text, header.entry_count)?,
        _ => read_group_entries(&mut r, &text, header.entry_count)?,
    };

    if r.remaining() > 0 {
        return Err(DecodeError::TrailingBytes {
            offset: r.position(),
            count: r.remaining(),
        });
    }

    let mut conv = Conversation {
        version: header.version,
        mode: header.mode,
        text_encoding: header.text_encoding,
        participants,
        entries,
    };
    conv.refresh_activity();
    Ok(conv)
}

fn read_participants(
    r: &mut ByteReader<'_>,
    count: usize,
) -> Result<Vec<Participant>, DecodeError> {
    let mut participants = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = r.position();
        let len = r.read_varint("participant name length")?;
        if len == 0 || len > MAX_NAME_BYTES as u64 {
            return Err(DecodeError::InvalidNameLength { offset, len });
        }
        let start = r.position();
        let raw = r.read_bytes(len as usize, "participant name")?;
        let name = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8 {
            offset: start,
            field: "participant name",
        })?;
        participants.push(Participant::new(name));
    }
    Ok(participants)
}

/// Message body decoding shared by both layouts.
struct TextReader {
    encoding: TextEncoding,
    escapes: EscapeDecoding,
    participant_count: usize,
}

impl TextReader {
    fn read_text(&self, r: &mut ByteReader<'_>) -> Result<String, DecodeError> {
        let offset = r.position();
        let len = r.read_count("message length")?;
        if len == 0 {
            return Err(DecodeError::EmptyMessage { offset });
        }
        match self.encoding {
            TextEncoding::SixBit => {
                let (text, used) = unpack_sixbit(r.rest(), len, self.escapes)
                    .map_err(|e| r.primitive("six-bit message", e))?;
                r.read_bytes(used, "six-bit message")?;
                Ok(text)
            }
            _ => {
                let start = r.position();
                let raw = r.read_bytes(len, "message")?;
                String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8 {
                    offset: start,
                    field: "message",
                })
            }
        }
    }

    fn check_index(&self, index: usize, offset: usize) -> Result<usize, DecodeError> {
        if index >= self.participant_count {
            return Err(DecodeError::ParticipantOutOfRange {
                offset,
                index,
                count: self.participant_count,
            });
        }
        Ok(index)
    }

    /// `[kind:4][participant:4]`
    fn read_event(&self, r: &mut ByteReader<'_>) -> Result<ConversationEntry, DecodeError> {
        let offset = r.position();
        let byte = r.read_u8("system event")?;
        let event = EventKind::from_nibble(byte >> 4).ok_or(DecodeError::UnknownEventKind {
            offset,
            kind: byte >> 4,
        })?;
        let participant = self.check_index((byte & 0x0F) as usize, offset)?;
        Ok(ConversationEntry::SystemEvent { event, participant })
    }
}

/// Duo layout: entry-type bitmap, first speaker, turn bitmap, payloads.
fn read_duo_entries(
    r: &mut ByteReader<'_>,
    text: &TextReader,
    entry_count: usize,
) -> Result<Vec<ConversationEntry>, DecodeError> {
    // Every entry costs at least one payload byte on top of its bitmap bit.
    if entry_count > r.remaining() {
        return Err(DecodeError::EntryCountTooLarge {
            count: entry_count,
            available: r.remaining(),
        });
    }

    let types = r.read_bytes(bitmap_len(entry_count), "entry type bitmap")?;
    let is_event =
        unpack_flags(types, entry_count).map_err(|e| r.primitive("entry type bitmap", e))?;
    let message_count = is_event.iter().filter(|&&event| !event).count();

    let speaker_offset = r.position();
    let first_speaker = r.read_u8("first speaker")?;
    // Written as 0 when there is nothing to attribute.
    if message_count > 0 {
        text.check_index(first_speaker as usize, speaker_offset)?;
    } else if first_speaker != 0 {
        return Err(DecodeError::StrayFirstSpeaker {
            offset: speaker_offset,
            value: first_speaker,
        });
    }

    let turns_offset = r.position();
    let turns = r.read_bytes(bitmap_len(message_count), "turn bitmap")?;
    let speakers = decode_turn_bitmap(first_speaker, turns, message_count)
        .map_err(|e| r.primitive("turn bitmap", e))?;
    for &speaker in &speakers {
        text.check_index(speaker as usize, turns_offset)?;
    }

    let mut speakers = speakers.into_iter();
    let mut entries = Vec::with_capacity(entry_count);
    for event in is_event {
        if event {
            entries.push(text.read_event(r)?);
        } else {
            // One speaker per message flag; counted above.
            let speaker = speakers.next().unwrap_or(first_speaker) as usize;
            entries.push(ConversationEntry::ChatMessage {
                speaker,
                text: text.read_text(r)?,
            });
        }
    }
    Ok(entries)
}

/// Group layout: per entry `varint(speaker + 1) text` or `varint(0) event`.
fn read_group_entries(
    r: &mut ByteReader<'_>,
    text: &TextReader,
    entry_count: usize,
) -> Result<Vec<ConversationEntry>, DecodeError> {
    // Every entry costs at least a tag byte and a payload byte.
    if entry_count > r.remaining() / 2 {
        return Err(DecodeError::EntryCountTooLarge {
            count: entry_count,
            available: r.remaining(),
        });
    }

    let mut entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let offset = r.position();
        let tag = r.read_count("entry tag")?;
        if tag == GROUP_EVENT_TAG {
            entries.push(text.read_event(r)?);
        } else {
            let speaker = text.check_index(tag - 1, offset)?;
            entries.push(ConversationEntry::ChatMessage {
                speaker,
                text: text.read_text(r)?,
            });
        }
    }
    Ok(entries)
}
