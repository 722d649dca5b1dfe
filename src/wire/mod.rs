//! Byte-exact wire format.
//!
//! ```text
//! byte 0: [version:2][mode:2][text_encoding:2][participant_hint:2]
//! [varint participant_count]       only when participant_hint == 3
//! [varint entry_count]
//! [varint name_len][name]*         one per participant, never compressed
//! [entry block]                    mode-specific, runs to end of buffer
//! ```
//! System events are one byte, `[kind:4][participant:4]`, in both layouts.
//!
//! Encoding and decoding are pure functions of their input: no I/O, no shared
//! state, nothing retained between calls.

pub mod decode;
pub mod encode;
pub mod header;

pub use decode::{deserialize, DecodeError};
pub use encode::{
    encode, encoded_len, select_text_encoding, serialize, text_len, EncodeError, EncodeOptions,
    Encoded,
};
pub use header::{peek_header, Header};

/// Group-mode tag value that marks a system event instead of a speaker.
pub(crate) const GROUP_EVENT_TAG: usize = 0;
