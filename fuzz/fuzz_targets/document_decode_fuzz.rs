#![no_main]
use libfuzzer_sys::fuzz_target;
use modpatch::document::{DocumentCodec, NativeCodec};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or error, never panic.
    if let Ok(doc) = NativeCodec.decode(data) {
        let encoded = NativeCodec.encode(&doc).unwrap();
        assert_eq!(NativeCodec.decode(&encoded).unwrap(), doc);
    }
});
