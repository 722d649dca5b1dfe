#![no_main]
use libfuzzer_sys::fuzz_target;
use qrchat_protocol::primitives::{pack_sixbit, packed_len, unpack_sixbit, EscapeDecoding};

fuzz_target!(|data: &[u8]| {
    // Arbitrary packed data with an arbitrary unit count must not panic
    if let Some((&units, rest)) = data.split_first() {
        let _ = unpack_sixbit(rest, units as usize, EscapeDecoding::Utf8);
        let _ = unpack_sixbit(rest, units as usize, EscapeDecoding::Latin1);
    }

    let text = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    // Pack-unpack round trip
    let packed = pack_sixbit(text);
    assert_eq!(packed.units, text.len(), "one unit per UTF-8 byte");
    assert_eq!(packed.bytes.len(), packed_len(text), "predicted size mismatch");

    let (unpacked, used) = unpack_sixbit(&packed.bytes, packed.units, EscapeDecoding::Utf8)
        .expect("packed text must unpack");
    assert_eq!(unpacked, text, "six-bit round-trip mismatch");
    assert_eq!(used, packed.bytes.len());
});
