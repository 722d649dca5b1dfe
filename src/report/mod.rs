//! Read-only helpers for displaying a conversation and planning around the
//! byte budget. Nothing here keeps state; everything is derived from a
//! `Conversation` and the wire encoder.

use serde::Serialize;
use std::fmt;

use crate::primitives::{bitmap_len, varint_len};
use crate::protocol::{Conversation, ConversationEntry, Mode, TextEncoding};
use crate::wire::{encode, encoded_len, select_text_encoding, EncodeError, EncodeOptions};

pub use crate::wire::{peek_header, Header};

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ParticipantSummary {
    pub index: usize,
    pub name: String,
    pub active: bool,
    pub messages: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ConversationSummary {
    pub version: u8,
    pub mode: Mode,
    /// Encoding the encoder would pick for this conversation.
    pub text_encoding: TextEncoding,
    pub participants: Vec<ParticipantSummary>,
    pub messages: usize,
    pub events: usize,
    /// Size of the untruncated encoding.
    pub encoded_bytes: usize,
}

impl ConversationSummary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for ConversationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} conversation (v{}, {}), {} bytes",
            self.mode.as_str(),
            self.version,
            self.text_encoding.as_str(),
            self.encoded_bytes
        )?;
        writeln!(
            f,
            "{} participant(s), {} message(s), {} event(s)",
            self.participants.len(),
            self.messages,
            self.events
        )?;
        for p in &self.participants {
            writeln!(
                f,
                "  [{}] {}{} - {} message(s)",
                p.index,
                p.name,
                if p.active { "" } else { " (left)" },
                p.messages
            )?;
        }
        Ok(())
    }
}

pub fn summarize(conv: &Conversation) -> Result<ConversationSummary, EncodeError> {
    let mut per_speaker = vec![0usize; conv.participants.len()];
    for entry in &conv.entries {
        if let ConversationEntry::ChatMessage { speaker, .. } = entry {
            if let Some(count) = per_speaker.get_mut(*speaker) {
                *count += 1;
            }
        }
    }

    let participants = conv
        .participants
        .iter()
        .zip(per_speaker)
        .enumerate()
        .map(|(index, (p, messages))| ParticipantSummary {
            index,
            name: p.name.clone(),
            active: p.active,
            messages,
        })
        .collect();

    Ok(ConversationSummary {
        version: conv.version,
        mode: conv.mode,
        text_encoding: select_text_encoding(conv, None),
        participants,
        messages: conv.message_count(),
        events: conv.event_count(),
        encoded_bytes: encoded_len(conv, None)?,
    })
}

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

/// Headroom of a conversation against a byte budget.
///
/// `next_message_chars` is an estimate, not a guarantee: it assumes the next
/// message is all in-alphabet text when the conversation encodes as six-bit,
/// and single-byte characters under utf8. Escaped or multi-byte characters
/// cost more, and a message that tips the six-bit ratio switches the encoding
/// of every message.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CapacityReport {
    /// Size the conversation would encode to with no budget.
    pub encoded_bytes: usize,
    pub max_bytes: usize,
    /// Bytes left before truncation starts (0 when already over).
    pub remaining_bytes: usize,
    /// Whether serializing under `max_bytes` drops old entries.
    pub would_truncate: bool,
    /// Entries a budgeted serialization keeps.
    pub retained_entries: usize,
    /// Characters a new message could carry without triggering truncation,
    /// assuming in-alphabet text under six-bit and ASCII under utf8.
    pub next_message_chars: usize,
}

pub fn capacity_report(
    conv: &Conversation,
    max_bytes: usize,
) -> Result<CapacityReport, EncodeError> {
    let encoded_bytes = encoded_len(conv, None)?;
    let remaining_bytes = max_bytes.saturating_sub(encoded_bytes);
    let options = EncodeOptions::default().with_max_bytes(max_bytes);
    let retained_entries = match encode(conv, &options) {
        Ok(encoded) => encoded.retained_entries,
        Err(EncodeError::CapacityExhausted { .. }) => 0,
        Err(e) => return Err(e),
    };

    Ok(CapacityReport {
        encoded_bytes,
        max_bytes,
        remaining_bytes,
        would_truncate: encoded_bytes > max_bytes,
        retained_entries,
        next_message_chars: next_message_chars(conv, remaining_bytes),
    })
}

/// Bytes one more message adds besides its own length prefix and body.
fn next_message_overhead(conv: &Conversation) -> usize {
    let entries = conv.entries.len();
    let count_growth = varint_len(entries as u64 + 1) - varint_len(entries as u64);
    let framing = match conv.mode {
        Mode::Duo => {
            let messages = conv.message_count();
            (bitmap_len(entries + 1) - bitmap_len(entries))
                + (bitmap_len(messages + 1) - bitmap_len(messages))
        }
        // Tag of the highest-numbered speaker.
        _ => varint_len(conv.participants.len() as u64),
    };
    count_growth + framing
}

/// Packed size of `units` in-alphabet characters.
fn sixbit_body_len(units: usize) -> usize {
    units / 4 * 3 + (units % 4 * 6).div_ceil(8)
}

/// Longest message that fits in `budget` bytes.
fn next_message_chars(conv: &Conversation, budget: usize) -> usize {
    let Some(budget) = budget.checked_sub(next_message_overhead(conv)) else {
        return 0;
    };
    let encoding = select_text_encoding(conv, None);
    let fits = |chars: usize| {
        let body = match encoding {
            TextEncoding::SixBit => sixbit_body_len(chars),
            _ => chars,
        };
        varint_len(chars as u64).saturating_add(body) <= budget
    };

    // Four six-bit units pack into three bytes, so nothing past 4/3 of the
    // budget can fit.
    let (mut lo, mut hi) = (0usize, (budget / 3).saturating_mul(4).saturating_add(4));
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}
