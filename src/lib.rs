//! # QR Chat Protocol
//!
//! **A bit-exact conversation codec sized for a single QR code.**
//!
//! A whole chat, with its participants, messages and join/leave events, is
//! packed into at most 2953 bytes (the binary capacity of a version 40 QR
//! code at error-correction level L). When a conversation outgrows the budget
//! the oldest entries are dropped, never the participant list.
//!
//! - **Compact header** (version, mode, text encoding and participant count in one byte)
//! - **Duo mode** (entry-type and speaker-turn bitmaps instead of per-message tags)
//! - **Group mode** (up to 15 participants, varint speaker tags)
//! - **Six-bit text** (63-symbol alphabet with an escape for everything else)
//! - **Capacity-driven truncation** (exact size prediction and a binary search)
//!
//! ## Quick Start
//!
//! ```rust
//! use qrchat_protocol::{create, deserialize, join, post_message, serialize, EncodeOptions};
//!
//! let mut conv = create("alice").unwrap();
//! let bob = join(&mut conv, "bob").unwrap();
//! post_message(&mut conv, 0, "hey bob").unwrap();
//! post_message(&mut conv, bob, "hi alice!").unwrap();
//!
//! let bytes = serialize(&conv, &EncodeOptions::default()).unwrap();
//! assert!(bytes.len() <= 2953);
//!
//! let decoded = deserialize(&bytes).unwrap();
//! assert_eq!(decoded.entries, conv.entries);
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`primitives`] | Bit cursor, varints, six-bit packing, turn bitmaps |
//! | [`protocol`] | Conversation model, header enums, protocol limits |
//! | [`lifecycle`] | Create, join, post, leave, structural validation |
//! | [`wire`] | Header, encoder with truncation, strict decoder |
//! | [`report`] | Human-readable and JSON summaries, capacity planning |
//! | `armor` | Base64url text armor for text-only channels |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std` | Yes | Standard library support |
//! | `armor` | Yes | Base64url armor (adds `base64`) |

#![allow(
    clippy::empty_line_after_doc_comments,
    clippy::doc_lazy_continuation,
    clippy::needless_range_loop
)]

// ── Public modules ──────────────────────────────────────────────────────────

/// Bit-level packing with no knowledge of conversations.
pub mod primitives;

/// Conversation model and protocol constants.
pub mod protocol;

/// Conversation lifecycle operations and validation.
pub mod lifecycle;

/// Byte-exact serialization and deserialization.
pub mod wire;

/// Summaries and capacity planning built on the encoder.
pub mod report;

/// Base64url armor around the wire bytes.
#[cfg(feature = "armor")]
pub mod armor;

// ── Re-exports for convenience ──────────────────────────────────────────────

pub use protocol::{
    Conversation, ConversationEntry, EventKind, Mode, Participant, TextEncoding,
    DEFAULT_MAX_BYTES, PROTOCOL_VERSION,
};

pub use lifecycle::{create, join, leave, post_message, validate, ValidationError};

pub use wire::{
    deserialize, encode, encoded_len, peek_header, select_text_encoding, serialize, DecodeError,
    EncodeError, EncodeOptions, Encoded, Header,
};

pub use report::{capacity_report, summarize, CapacityReport, ConversationSummary};

#[cfg(feature = "armor")]
pub use armor::{deserialize_armored, serialize_armored, ArmorError};

// ── Library metadata ────────────────────────────────────────────────────────

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
pub fn version() -> &'static str {
    VERSION
}

// ── Tests ───────────────────────────────────────────────────────────────────
