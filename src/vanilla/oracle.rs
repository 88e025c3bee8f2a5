// Vanilla lookups across game revisions.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::index::FingerprintIndex;

/// Hash used for both fingerprint keys and content.
pub trait ContentHasher: Send + Sync {
    fn hash(&self, bytes: &[u8]) -> u64;
}

/// First eight bytes of SHA-256, little-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn hash(&self, bytes: &[u8]) -> u64 {
        let digest = Sha256::digest(bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(head)
    }
}

/// Outcome of one fingerprint lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lookup {
    /// The path is a known vanilla path.
    pub entry_found: bool,
    /// The content matches the vanilla fingerprint.
    pub vanilla: bool,
}

#[derive(Clone)]
pub struct VanillaOracle {
    index: Arc<FingerprintIndex>,
    hasher: Arc<dyn ContentHasher>,
    versions: Vec<u32>,
}

impl VanillaOracle {
    /// `versions` are checked in ascending order whatever order they come in.
    pub fn new(index: Arc<FingerprintIndex>, hasher: Arc<dyn ContentHasher>, versions: &[u32]) -> Self {
        let mut versions = versions.to_vec();
        versions.sort_unstable();
        versions.dedup();
        Self {
            index,
            hasher,
            versions,
        }
    }

    pub fn versions(&self) -> &[u32] {
        &self.versions
    }

    /// Look `data` up for one revision: the revision-tagged key first, then
    /// the untagged key.
    pub fn lookup(&self, canonical: &str, data: &[u8], revision: u32) -> Lookup {
        let tagged = self.hasher.hash(format!("{canonical}#{revision}").as_bytes());
        let expected = self
            .index
            .get(tagged)
            .or_else(|| self.index.get(self.hasher.hash(canonical.as_bytes())));
        match expected {
            Some(expected) => Lookup {
                entry_found: true,
                vanilla: expected == self.hasher.hash(data),
            },
            None => Lookup::default(),
        }
    }

    /// Look `data` up under every configured revision, stopping at the first
    /// that matches.
    pub fn check(&self, canonical: &str, data: &[u8]) -> Lookup {
        let mut entry_found = false;
        for &revision in &self.versions {
            let lookup = self.lookup(canonical, data, revision);
            if lookup.vanilla {
                log::debug!("{canonical} is vanilla in revision {revision}");
                return lookup;
            }
            entry_found |= lookup.entry_found;
        }
        Lookup {
            entry_found,
            vanilla: false,
        }
    }

    pub fn is_vanilla(&self, canonical: &str, data: &[u8]) -> bool {
        self.check(canonical, data).vanilla
    }

    /// Lookup key of an archive member. Members of `.pack` archives are
    /// fingerprinted by their own path, others below the archive's path.
    pub fn member_key(archive_canonical: &str, member: &str) -> String {
        if archive_canonical.ends_with(".pack") {
            member.to_owned()
        } else {
            format!("{archive_canonical}/{member}")
        }
    }
}

impl std::fmt::Debug for VanillaOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VanillaOracle")
            .field("fingerprints", &self.index.len())
            .field("versions", &self.versions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(index: FingerprintIndex, versions: &[u32]) -> VanillaOracle {
        VanillaOracle::new(Arc::new(index), Arc::new(Sha256Hasher), versions)
    }

    #[test]
    fn matches_any_revision_in_any_order() {
        let mut index = FingerprintIndex::new();
        index.record(&Sha256Hasher, "Pack/A.pack", Some(100), b"old");
        index.record(&Sha256Hasher, "Pack/A.pack", Some(110), b"new");

        for versions in [[100, 110], [110, 100]] {
            let oracle = oracle(index.clone(), &versions);
            assert!(oracle.is_vanilla("Pack/A.pack", b"new"));
            assert!(oracle.is_vanilla("Pack/A.pack", b"old"));
            let miss = oracle.check("Pack/A.pack", b"modded");
            assert_eq!(miss, Lookup { entry_found: true, vanilla: false });
        }
    }

    #[test]
    fn untagged_key_is_the_fallback() {
        let mut index = FingerprintIndex::new();
        index.record(&Sha256Hasher, "Shop/Items.byml", None, b"items");
        let oracle = oracle(index, &[120]);
        assert!(oracle.lookup("Shop/Items.byml", b"items", 120).vanilla);
        assert_eq!(oracle.check("Unknown.byml", b"items"), Lookup::default());
    }

    #[test]
    fn member_keys() {
        assert_eq!(VanillaOracle::member_key("Pack/Actor/Foo.pack", "A/B.bgyml"), "A/B.bgyml");
        assert_eq!(
            VanillaOracle::member_key("UI/Layout.blarc", "lyt/x.bflyt"),
            "UI/Layout.blarc/lyt/x.bflyt"
        );
    }

    #[test]
    fn hasher_is_stable() {
        assert_eq!(Sha256Hasher.hash(b""), 0x141c_fc98_42c4_b0e3);
        assert_ne!(Sha256Hasher.hash(b"a"), Sha256Hasher.hash(b"b"));
    }
}
