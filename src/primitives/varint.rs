/// Unsigned LEB128 variable-length integers.
///
/// Seven data bits per byte, low group first; the high bit is set on every
/// byte except the last. 0..=127 takes one byte, 128..=16383 takes two.
use crate::primitives::PrimitiveError;

/// Longest possible encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Encode `value` into a fresh buffer.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(varint_len(value));
    write_varint(&mut out, value);
    out
}

/// Append the encoding of `value` to `out`, returning the bytes written.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) -> usize {
    let start = out.len();
    loop {
        let low = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(low);
            break;
        }
        out.push(low | 0x80);
    }
    out.len() - start
}

/// Exact number of bytes `value` occupies once encoded.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Decode one varint from the front of `data`.
///
/// Returns the value and the number of bytes it occupied. Offsets in errors
/// are relative to `data`.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), PrimitiveError> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(PrimitiveError::VarintOverflow { offset: i });
        }
        let group = (byte & 0x7F) as u64;
        let shift = 7 * i as u32;
        // The tenth byte may only contribute the single remaining bit.
        if shift == 63 && group > 1 {
            return Err(PrimitiveError::VarintOverflow { offset: i });
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(PrimitiveError::VarintUnterminated { offset: data.len() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_range() {
        for v in [0u64, 1, 42, 127] {
            assert_eq!(encode_varint(v), vec![v as u8]);
            assert_eq!(varint_len(v), 1);
        }
    }

    #[test]
    fn test_two_byte_range() {
        assert_eq!(encode_varint(128), vec![0x80, 0x01]);
        assert_eq!(encode_varint(300), vec![0xAC, 0x02]);
        assert_eq!(encode_varint(16383), vec![0xFF, 0x7F]);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(16383), 2);
        assert_eq!(varint_len(16384), 3);
    }

    #[test]
    fn test_roundtrip_reports_length() {
        let mut v = 0u64;
        while v < (1 << 31) {
            let encoded = encode_varint(v);
            assert_eq!(decode_varint(&encoded).unwrap(), (v, encoded.len()));
            assert_eq!(varint_len(v), encoded.len());
            v = v * 3 + 1;
        }
        let max = encode_varint(u64::MAX);
        assert_eq!(max.len(), MAX_VARINT_LEN);
        assert_eq!(decode_varint(&max).unwrap(), (u64::MAX, MAX_VARINT_LEN));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        assert_eq!(decode_varint(&[0xAC, 0x02, 0xFF]).unwrap(), (300, 2));
    }

    #[test]
    fn test_unterminated_is_error() {
        assert!(matches!(
            decode_varint(&[0x80, 0x80]),
            Err(PrimitiveError::VarintUnterminated { offset: 2 })
        ));
        assert!(matches!(
            decode_varint(&[]),
            Err(PrimitiveError::VarintUnterminated { offset: 0 })
        ));
    }

    #[test]
    fn test_overlong_is_error() {
        let overlong = [0xFFu8; 11];
        assert!(matches!(
            decode_varint(&overlong),
            Err(PrimitiveError::VarintOverflow { .. })
        ));
    }
}
