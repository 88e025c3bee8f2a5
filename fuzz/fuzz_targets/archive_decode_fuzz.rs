#![no_main]
use libfuzzer_sys::fuzz_target;
use modpatch::archive::{ArchiveFormat, ArchiveLocationCache, PackedArchiveFormat};

fuzz_target!(|data: &[u8]| {
    if let Ok(entries) = PackedArchiveFormat.decode(data) {
        let encoded = PackedArchiveFormat.encode(&entries).unwrap();
        assert_eq!(PackedArchiveFormat.decode(&encoded).unwrap().len(), entries.len());
    }
    let _ = ArchiveLocationCache::from_bytes(data);
});
