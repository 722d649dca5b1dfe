//! Conversation lifecycle: create, join or rejoin, post, leave.
//!
//! Every operation validates first and mutates second: on error the
//! conversation is left exactly as it was. Entries are only ever appended.
//! The cached `Participant::active` flags are updated in the same step as the
//! append, so they always equal `Conversation::replay_activity()`. Likewise
//! `Conversation::text_encoding` follows the posted messages, so an unforced
//! encode writes exactly the encoding the value already carries.
//!
//! One conversation value is owned by one session; callers serialize any
//! concurrent access themselves.

use thiserror::Error;

use crate::protocol::{
    Conversation, ConversationEntry, Mode, Participant, DUO_MAX_PARTICIPANTS, MAX_NAME_BYTES,
    MAX_PARTICIPANTS, PROTOCOL_VERSION,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Participant name must be 1..={MAX_NAME_BYTES} bytes, got {0} bytes")]
    InvalidName(usize),

    #[error("Participant index {index} out of range ({count} participants)")]
    ParticipantOutOfRange { index: usize, count: usize },

    #[error("Participant {0} is not active")]
    ParticipantInactive(usize),

    #[error("Participant '{0}' is already active")]
    AlreadyActive(String),

    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Conversation is full ({MAX_PARTICIPANTS} participants)")]
    ConversationFull,

    #[error("Mode {mode:?} cannot hold {participants} participants")]
    ModeMismatch { mode: Mode, participants: usize },

    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u8),
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Start a conversation with `name` as participant 0.
///
/// The creator's Enter event is the first entry.
pub fn create(name: &str) -> Result<Conversation, ValidationError> {
    validate_name(name)?;
    let mut conv = Conversation::new();
    conv.participants.push(Participant {
        name: name.to_string(),
        active: true,
    });
    conv.entries.push(ConversationEntry::enter(0));
    Ok(conv)
}

/// Join (or rejoin) `conv` under `name`, returning the participant index.
///
/// A name matching an existing participant, ignoring case, reuses that index.
/// The third distinct participant upgrades a Duo conversation to Group; the
/// mode never goes back.
pub fn join(conv: &mut Conversation, name: &str) -> Result<usize, ValidationError> {
    validate_name(name)?;

    if let Some(index) = conv.find_participant(name) {
        if conv.participants[index].active {
            return Err(ValidationError::AlreadyActive(
                conv.participants[index].name.clone(),
            ));
        }
        conv.entries.push(ConversationEntry::enter(index));
        conv.participants[index].active = true;
        log::debug!("participant {} rejoined", index);
        return Ok(index);
    }

    if conv.participants.len() >= MAX_PARTICIPANTS {
        return Err(ValidationError::ConversationFull);
    }

    let index = conv.participants.len();
    conv.participants.push(Participant {
        name: name.to_string(),
        active: true,
    });
    conv.entries.push(ConversationEntry::enter(index));

    if conv.mode == Mode::Duo && conv.participants.len() > DUO_MAX_PARTICIPANTS {
        conv.mode = Mode::Group;
        log::debug!(
            "conversation upgraded to group mode ({} participants)",
            conv.participants.len()
        );
    }
    Ok(index)
}

/// Append a chat message from an active participant.
pub fn post_message(
    conv: &mut Conversation,
    speaker: usize,
    text: &str,
) -> Result<(), ValidationError> {
    check_index(conv, speaker)?;
    if !conv.participants[speaker].active {
        return Err(ValidationError::ParticipantInactive(speaker));
    }
    if text.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    conv.entries.push(ConversationEntry::message(speaker, text));
    conv.text_encoding = conv.preferred_text_encoding();
    Ok(())
}

/// Mark an active participant as gone. The participant keeps its index.
pub fn leave(conv: &mut Conversation, participant: usize) -> Result<(), ValidationError> {
    check_index(conv, participant)?;
    if !conv.participants[participant].active {
        return Err(ValidationError::ParticipantInactive(participant));
    }
    conv.entries.push(ConversationEntry::exit(participant));
    conv.participants[participant].active = false;
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > MAX_NAME_BYTES {
        return Err(ValidationError::InvalidName(name.len()));
    }
    Ok(())
}

fn check_index(conv: &Conversation, index: usize) -> Result<(), ValidationError> {
    if index >= conv.participants.len() {
        return Err(ValidationError::ParticipantOutOfRange {
            index,
            count: conv.participants.len(),
        });
    }
    Ok(())
}

/// Structural check of a whole conversation before it is serialized.
///
/// Covers what the wire format can represent; it does not require messages to
/// come from active speakers, since a value may have been assembled by hand.
pub fn validate(conv: &Conversation) -> Result<(), ValidationError> {
    if conv.version > PROTOCOL_VERSION {
        return Err(ValidationError::UnsupportedVersion(conv.version));
    }

    let participants = conv.participants.len();
    let capacity = match conv.mode {
        Mode::Duo => DUO_MAX_PARTICIPANTS,
        Mode::Group => MAX_PARTICIPANTS,
        Mode::Solo | Mode::Extended => 0,
    };
    if participants > capacity || !conv.mode.is_implemented() {
        return Err(ValidationError::ModeMismatch {
            mode: conv.mode,
            participants,
        });
    }

    for participant in &conv.participants {
        validate_name(&participant.name)?;
    }

    for entry in &conv.entries {
        check_index(conv, entry.participant())?;
        if let ConversationEntry::ChatMessage { text, .. } = entry {
            if text.is_empty() {
                return Err(ValidationError::EmptyMessage);
            }
        }
    }
    Ok(())
}
