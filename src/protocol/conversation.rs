/// Conversation data model.
///
/// A `Conversation` is the whole serialization unit: header fields, the
/// participant list and the ordered entry stream. Entry order is the timeline;
/// there are no timestamps or ids. Participants are identified only by their
/// index, which never changes once assigned.
///
/// `Participant::active` is derived state. It is recomputed from the entry
/// stream by [`Conversation::refresh_activity`] and never written to the wire.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::primitives::sixbit_ratio;
use crate::protocol::limits::{PROTOCOL_VERSION, SIXBIT_SELECT_RATIO};

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Conversation topology, two bits in the header.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Mode {
    /// Exactly two parties; speakers are carried in a turn bitmap.
    #[default]
    Duo = 0,
    /// Three to fifteen parties; inline speaker index per message.
    Group = 1,
    /// Reserved: single author, read-many board.
    Solo = 2,
    /// Reserved: header continues past byte 0.
    Extended = 3,
}

impl Mode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Mode::Duo,
            1 => Mode::Group,
            2 => Mode::Solo,
            _ => Mode::Extended,
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, Mode::Duo | Mode::Group)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Duo => "duo",
            Mode::Group => "group",
            Mode::Solo => "solo",
            Mode::Extended => "extended",
        }
    }
}

// ---------------------------------------------------------------------------
// TextEncoding
// ---------------------------------------------------------------------------

/// Compression applied to message bodies, two bits in the header.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TextEncoding {
    #[default]
    Utf8 = 0,
    SixBit = 1,
    /// Reserved: static-table entropy coder.
    Huffman = 2,
    /// Reserved: deflate-style coder.
    Deflate = 3,
}

impl TextEncoding {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => TextEncoding::Utf8,
            1 => TextEncoding::SixBit,
            2 => TextEncoding::Huffman,
            _ => TextEncoding::Deflate,
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, TextEncoding::Utf8 | TextEncoding::SixBit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf8",
            TextEncoding::SixBit => "sixbit",
            TextEncoding::Huffman => "huffman",
            TextEncoding::Deflate => "deflate",
        }
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    /// 1..=32 bytes of UTF-8, never compressed on the wire.
    pub name: String,
    /// Derived from the entry stream; see `Conversation::refresh_activity`.
    #[serde(default)]
    pub active: bool,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Participant {
            name: name.into(),
            active: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// System event kind, high nibble of the event byte.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Enter = 0,
    Exit = 1,
}

impl EventKind {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0 => Some(EventKind::Enter),
            1 => Some(EventKind::Exit),
            _ => None,
        }
    }
}

/// One unit of the timeline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEntry {
    ChatMessage { speaker: usize, text: String },
    SystemEvent { event: EventKind, participant: usize },
}

impl ConversationEntry {
    pub fn message(speaker: usize, text: impl Into<String>) -> Self {
        ConversationEntry::ChatMessage {
            speaker,
            text: text.into(),
        }
    }

    pub fn enter(participant: usize) -> Self {
        ConversationEntry::SystemEvent {
            event: EventKind::Enter,
            participant,
        }
    }

    pub fn exit(participant: usize) -> Self {
        ConversationEntry::SystemEvent {
            event: EventKind::Exit,
            participant,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, ConversationEntry::ChatMessage { .. })
    }

    /// The participant this entry refers to, whatever its kind.
    pub fn participant(&self) -> usize {
        match self {
            ConversationEntry::ChatMessage { speaker, .. } => *speaker,
            ConversationEntry::SystemEvent { participant, .. } => *participant,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub version: u8,
    pub mode: Mode,
    pub text_encoding: TextEncoding,
    pub participants: Vec<Participant>,
    pub entries: Vec<ConversationEntry>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Empty Duo conversation at the current protocol version.
    pub fn new() -> Self {
        Conversation {
            version: PROTOCOL_VERSION,
            mode: Mode::Duo,
            text_encoding: TextEncoding::Utf8,
            participants: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn message_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_message()).count()
    }

    pub fn event_count(&self) -> usize {
        self.entries.len() - self.message_count()
    }

    /// Message bodies in timeline order.
    pub fn message_texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match e {
            ConversationEntry::ChatMessage { text, .. } => Some(text.as_str()),
            ConversationEntry::SystemEvent { .. } => None,
        })
    }

    /// Text encoding an unforced encode writes: six-bit when more than 90% of
    /// message characters are in its alphabet, utf8 otherwise.
    pub fn preferred_text_encoding(&self) -> TextEncoding {
        if sixbit_ratio(self.message_texts()) > SIXBIT_SELECT_RATIO {
            TextEncoding::SixBit
        } else {
            TextEncoding::Utf8
        }
    }

    /// Index of the participant whose name matches, ignoring case.
    pub fn find_participant(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.participants
            .iter()
            .position(|p| p.name.to_lowercase() == wanted)
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.participants.get(index).is_some_and(|p| p.active)
    }

    pub fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| p.active).count()
    }

    /// Replay the entry stream and return each participant's presence.
    ///
    /// Everyone starts absent. Enter marks present, Exit marks absent, and a
    /// message marks its speaker present. Out-of-range indices are skipped.
    pub fn replay_activity(&self) -> Vec<bool> {
        let mut active = vec![false; self.participants.len()];
        for entry in &self.entries {
            let (index, present) = match entry {
                ConversationEntry::ChatMessage { speaker, .. } => (*speaker, true),
                ConversationEntry::SystemEvent { event, participant } => {
                    (*participant, *event == EventKind::Enter)
                }
            };
            if let Some(slot) = active.get_mut(index) {
                *slot = present;
            }
        }
        active
    }

    /// Overwrite every `Participant::active` flag from the entry stream.
    pub fn refresh_activity(&mut self) {
        let active = self.replay_activity();
        for (participant, present) in self.participants.iter_mut().zip(active) {
            participant.active = present;
        }
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let name = |i: usize| {
                self.participants
                    .get(i)
                    .map(|p| p.name.as_str())
                    .unwrap_or("?")
            };
            match entry {
                ConversationEntry::ChatMessage { speaker, text } => {
                    writeln!(f, "{}: {}", name(*speaker), text)?
                }
                ConversationEntry::SystemEvent { event, participant } => match event {
                    EventKind::Enter => writeln!(f, "* {} joined", name(*participant))?,
                    EventKind::Exit => writeln!(f, "* {} left", name(*participant))?,
                },
            }
        }
        Ok(())
    }
}
