#![no_main]
use libfuzzer_sys::fuzz_target;
use modpatch::gdl::Changelog;

fuzz_target!(|data: &[u8]| {
    if let Ok(changelog) = Changelog::from_bytes(data) {
        let bytes = changelog.to_bytes().unwrap();
        assert_eq!(Changelog::from_bytes(&bytes).unwrap().len(), changelog.len());
    }
});
