//! Text armor for encoded conversations.
//!
//! Binary-mode QR scanning is unevenly supported, so the wire bytes can also
//! travel as unpadded base64url. Armor changes the transport only; the bytes
//! inside are exactly what `serialize` produced. Armored text is 4/3 the size
//! of the binary form, so budget accordingly (2953 binary bytes become 3938
//! characters, more than an alphanumeric QR holds).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

use crate::protocol::Conversation;
use crate::wire::{deserialize, serialize, DecodeError, EncodeError, EncodeOptions};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArmorError {
    #[error("Invalid base64url text: {0}")]
    Base64(String),

    #[error("Armored payload did not decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("Conversation did not encode: {0}")]
    Encode(#[from] EncodeError),
}

/// Base64url (no padding) of raw wire bytes.
pub fn armor(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Inverse of [`armor`]. Surrounding whitespace is ignored.
pub fn dearmor(text: &str) -> Result<Vec<u8>, ArmorError> {
    URL_SAFE_NO_PAD
        .decode(text.trim())
        .map_err(|e| ArmorError::Base64(e.to_string()))
}

/// Serialize and armor in one step. `options.max_bytes` still bounds the
/// binary size, not the armored length.
pub fn serialize_armored(
    conv: &Conversation,
    options: &EncodeOptions,
) -> Result<String, ArmorError> {
    Ok(armor(&serialize(conv, options)?))
}

pub fn deserialize_armored(text: &str) -> Result<Conversation, ArmorError> {
    let bytes = dearmor(text)?;
    Ok(deserialize(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{create, join, post_message};
    use hex_literal::hex;

    #[test]
    fn test_armor_known_bytes() {
        let bytes = hex!("42 04 01 61 01 62 c0 00 80 00 01 02 68 69 02 79 6f");
        let text = armor(&bytes);
        assert!(!text.contains('='));
        assert!(!text.contains('+') && !text.contains('/'));
        assert_eq!(dearmor(&text).unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_armored_conversation() {
        let mut conv = create("alice").unwrap();
        join(&mut conv, "bob").unwrap();
        post_message(&mut conv, 1, "see you at 5?").unwrap();

        let text = serialize_armored(&conv, &EncodeOptions::default()).unwrap();
        let decoded = deserialize_armored(&format!("  {}\n", text)).unwrap();
        assert_eq!(decoded.entries, conv.entries);
        assert_eq!(decoded.participants, conv.participants);
    }

    #[test]
    fn test_dearmor_rejects_garbage() {
        assert!(matches!(dearmor("not base64!"), Err(ArmorError::Base64(_))));
        assert!(matches!(
            deserialize_armored(""),
            Err(ArmorError::Decode(DecodeError::Empty))
        ));
    }
}
