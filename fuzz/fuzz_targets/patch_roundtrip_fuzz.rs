#![no_main]
use libfuzzer_sys::fuzz_target;
use modpatch::document::{DocumentCodec, NativeCodec};
use modpatch::patch::{self, Patch};

fuzz_target!(|data: &[u8]| {
    // Split the input into two documents; diffing and applying must not
    // panic on either.
    if data.len() < 2 {
        return;
    }
    let (first, second) = data.split_at(data.len() / 2);
    let (Ok(reference), Ok(modified)) = (NativeCodec.decode(first), NativeCodec.decode(second))
    else {
        return;
    };
    let delta = patch::diff(&reference, &modified);
    let _ = patch::apply(&reference, &delta);
    let wire = NativeCodec.encode(&delta.to_document()).unwrap();
    let _ = NativeCodec.decode(&wire).map(|doc| Patch::from_document(&doc));

    // Any decoded document may also be read as a patch.
    if let Ok(parsed) = Patch::from_document(&modified) {
        let _ = patch::apply(&reference, &parsed);
    }
});
