#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qrchat_protocol::{
    create, deserialize, encode, join, leave, post_message, EncodeOptions, TextEncoding,
};

#[derive(Arbitrary, Debug)]
enum Op {
    Join(String),
    Post(u8, String),
    Leave(u8),
}

#[derive(Arbitrary, Debug)]
struct Input {
    creator: String,
    ops: Vec<Op>,
    max_bytes: u16,
    force_sixbit: bool,
}

fuzz_target!(|input: Input| {
    // Invalid operations must be rejected without touching the conversation
    let mut conv = match create(&input.creator) {
        Ok(conv) => conv,
        Err(_) => return,
    };
    for op in input.ops.iter().take(256) {
        let before = conv.clone();
        let result = match op {
            Op::Join(name) => join(&mut conv, name).map(|_| ()),
            Op::Post(who, text) => post_message(&mut conv, *who as usize, text),
            Op::Leave(who) => leave(&mut conv, *who as usize),
        };
        if result.is_err() {
            assert_eq!(conv, before, "failed operation mutated the conversation");
        }
    }

    let mut options = EncodeOptions::default().with_max_bytes(input.max_bytes as usize);
    if input.force_sixbit {
        options = options.with_text_encoding(TextEncoding::SixBit);
    }

    // Encode within the budget; the kept entries are always a suffix
    let encoded = match encode(&conv, &options) {
        Ok(encoded) => encoded,
        Err(_) => return,
    };
    assert!(encoded.bytes.len() <= input.max_bytes as usize);

    let decoded = deserialize(&encoded.bytes).expect("encoder output must decode");
    assert_eq!(decoded.participants.len(), conv.participants.len());
    assert_eq!(decoded.entries, conv.entries[encoded.dropped_entries..]);
    if encoded.dropped_entries == 0 {
        let activity: Vec<bool> = conv.participants.iter().map(|p| p.active).collect();
        let replayed: Vec<bool> = decoded.participants.iter().map(|p| p.active).collect();
        assert_eq!(replayed, activity);
        if !input.force_sixbit {
            assert_eq!(decoded, conv, "unforced round trip changed the conversation");
        }
    }
});
