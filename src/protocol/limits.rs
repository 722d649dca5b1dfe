/// Protocol constants shared by the codec and the lifecycle manager.

/// Version written by the encoder.
///
/// - v0: six-bit escapes decode one Latin-1 char per escaped byte.
/// - v1: six-bit escapes are regrouped into UTF-8.
pub const PROTOCOL_VERSION: u8 = 1;

/// Oldest version the decoder still accepts.
pub const MIN_SUPPORTED_VERSION: u8 = 0;

/// Byte capacity of a version 40 QR code at error correction level L.
pub const DEFAULT_MAX_BYTES: usize = 2953;

/// Display names are 1..=32 bytes of UTF-8.
pub const MAX_NAME_BYTES: usize = 32;

/// Upper bound of Group mode. Also keeps every index inside the 4-bit
/// participant nibble of a system event byte.
pub const MAX_PARTICIPANTS: usize = 15;

/// Participants a Duo conversation may hold before it upgrades to Group.
pub const DUO_MAX_PARTICIPANTS: usize = 2;

/// Auto-selection picks SixBit when strictly more than this share of the
/// message characters is in the six-bit alphabet.
pub const SIXBIT_SELECT_RATIO: f64 = 0.90;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participants_fit_event_nibble() {
        assert!(MAX_PARTICIPANTS <= 16);
        assert!(DUO_MAX_PARTICIPANTS < MAX_PARTICIPANTS);
    }

    #[test]
    fn test_versions_fit_header_bits() {
        assert!(PROTOCOL_VERSION <= 3);
        assert!(MIN_SUPPORTED_VERSION <= PROTOCOL_VERSION);
    }
}
