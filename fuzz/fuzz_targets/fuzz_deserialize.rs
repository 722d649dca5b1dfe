#![no_main]
use libfuzzer_sys::fuzz_target;
use qrchat_protocol::{deserialize, peek_header, serialize, EncodeOptions};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic
    let header = peek_header(data);
    let conv = match deserialize(data) {
        Ok(conv) => conv,
        Err(_) => return,
    };

    // Anything that decodes has a valid header
    let header = header.expect("decodable input must have a readable header");
    assert_eq!(header.participant_count, conv.participants.len());
    assert_eq!(header.entry_count, conv.entries.len());

    // Re-encoding a decoded value must succeed and decode to the same entries
    let options = EncodeOptions::default().with_max_bytes(usize::MAX);
    let bytes = serialize(&conv, &options).expect("decoded conversation must re-encode");
    let again = deserialize(&bytes).expect("re-encoded bytes must decode");
    assert_eq!(again.participants, conv.participants);
    assert_eq!(again.entries, conv.entries);
});
