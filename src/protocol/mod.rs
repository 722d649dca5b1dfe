pub mod conversation;
pub mod limits;

pub use conversation::{
    Conversation, ConversationEntry, EventKind, Mode, Participant, TextEncoding,
};
pub use limits::{
    DEFAULT_MAX_BYTES, DUO_MAX_PARTICIPANTS, MAX_NAME_BYTES, MAX_PARTICIPANTS,
    MIN_SUPPORTED_VERSION, PROTOCOL_VERSION, SIXBIT_SELECT_RATIO,
};
