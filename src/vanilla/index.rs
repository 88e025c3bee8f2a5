// Fingerprint index file.
//
// A flat little-endian array of u64. The first half holds key hashes, the
// second half the content hash for the key at the same position.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::FingerprintError;
use super::oracle::ContentHasher;

#[derive(Debug, Clone, Default)]
pub struct FingerprintIndex {
    entries: HashMap<u64, u64>,
    /// Insertion order, for writing.
    keys: Vec<u64>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, FingerprintError> {
        if !path.is_file() {
            return Err(FingerprintError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let index = Self::from_bytes(&bytes)?;
        log::debug!("loaded {} fingerprints from {}", index.len(), path.display());
        Ok(index)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FingerprintError> {
        if bytes.len() % 8 != 0 {
            return Err(FingerprintError::Truncated(bytes.len()));
        }
        let words = bytes.len() / 8;
        let half = words / 2;
        let mut values = Cursor::new(bytes);
        let mut all = Vec::with_capacity(words);
        for _ in 0..words {
            all.push(values.read_u64::<LittleEndian>()?);
        }

        let mut index = Self::new();
        for (key, content) in all[..half].iter().zip(&all[half..]) {
            index.insert(*key, *content);
        }
        Ok(index)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.keys.len() * 16);
        for key in &self.keys {
            out.extend_from_slice(&key.to_le_bytes());
        }
        for key in &self.keys {
            let content = self.entries.get(key).copied().unwrap_or_default();
            out.extend_from_slice(&content.to_le_bytes());
        }
        out
    }

    /// Add a key. An existing key keeps its first content hash.
    pub fn insert(&mut self, key: u64, content: u64) {
        if self.entries.contains_key(&key) {
            log::debug!("duplicate fingerprint key {key:#018x}, keeping the first");
            return;
        }
        self.entries.insert(key, content);
        self.keys.push(key);
    }

    /// Fingerprint `data` under `canonical`, for one revision or for all.
    pub fn record(
        &mut self,
        hasher: &dyn ContentHasher,
        canonical: &str,
        revision: Option<u32>,
        data: &[u8],
    ) {
        let key = match revision {
            Some(revision) => hasher.hash(format!("{canonical}#{revision}").as_bytes()),
            None => hasher.hash(canonical.as_bytes()),
        };
        self.insert(key, hasher.hash(data));
    }

    pub fn get(&self, key: u64) -> Option<u64> {
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
