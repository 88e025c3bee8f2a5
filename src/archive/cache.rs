// Archive location cache.
//
// Maps a member path to the canonical path of the vanilla archive that
// embeds it, so a loose file can be put back where it came from. Built once
// by scanning the game tree and persisted as:
//
//   "STMC" | version i16 (= 1) | count i32 | (key string, value string)*
//
// Strings are 7-bit length-prefixed UTF-8. Duplicate keys keep the first.

use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{ArchiveError, ArchiveFormat, is_archive_path};
use crate::compress::{Compression, CompressionProfile, is_compressed_path};
use crate::vanilla::canonical_path;
use crate::wire;

const MAGIC: &[u8; 4] = b"STMC";
const VERSION: i16 = 1;

#[derive(Debug, Clone, Default)]
pub struct ArchiveLocationCache {
    locations: HashMap<String, String>,
    order: Vec<String>,
}

impl ArchiveLocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping unless `member` is already known.
    pub fn insert(&mut self, member: impl Into<String>, archive: impl Into<String>) {
        let member = member.into();
        if self.locations.contains_key(&member) {
            return;
        }
        self.locations.insert(member.clone(), archive.into());
        self.order.push(member);
    }

    /// Canonical path of the archive embedding `member`.
    pub fn archive_of(&self, member: &str) -> Option<&str> {
        self.locations
            .get(member)
            .map(String::as_str)
            .filter(|archive| !archive.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ArchiveError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        let version = r.read_i16::<LittleEndian>()?;
        if version != VERSION {
            return Err(ArchiveError::Format(format!(
                "unsupported cache version {version}"
            )));
        }
        let count = r.read_i32::<LittleEndian>()?;
        let count = usize::try_from(count)
            .map_err(|_| ArchiveError::Format(format!("negative entry count {count}")))?;

        let mut cache = Self::new();
        for _ in 0..count {
            let key = wire::read_string(r)?;
            let value = wire::read_string(r)?;
            cache.insert(key, value);
        }
        Ok(cache)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ArchiveError> {
        let count = i32::try_from(self.order.len())
            .map_err(|_| ArchiveError::Format("too many cache entries".into()))?;
        w.write_all(MAGIC)?;
        w.write_i16::<LittleEndian>(VERSION)?;
        w.write_i32::<LittleEndian>(count)?;
        for key in &self.order {
            wire::write_string(w, key)?;
            wire::write_string(w, &self.locations[key])?;
        }
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        Self::read_from(&mut Cursor::new(bytes))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let mut reader = BufReader::new(fs::File::open(path)?);
        Self::read_from(&mut reader)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(fs::File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Scan every archive below `game_path`. Archives that cannot be read
    /// are logged and skipped.
    pub fn build(
        game_path: &Path,
        compression: &Compression,
        format: &dyn ArchiveFormat,
    ) -> Result<Self, ArchiveError> {
        log::info!("building archive location cache from {}", game_path.display());
        let mut cache = Self::new();
        for file in crate::io::walk_files(game_path)? {
            if !is_archive_path(&file) {
                continue;
            }
            let Some(archive) = canonical_path(game_path, &file) else {
                continue;
            };
            let listing = fs::read(&file)
                .map_err(ArchiveError::from)
                .and_then(|bytes| {
                    if is_compressed_path(&file) {
                        let profile = CompressionProfile::for_path(&file);
                        compression
                            .decompress(&bytes, profile)
                            .map_err(|e| ArchiveError::Format(e.to_string()))
                    } else {
                        Ok(bytes)
                    }
                })
                .and_then(|bytes| format.decode(&bytes));
            match listing {
                Ok(listing) => {
                    for member in listing.members() {
                        cache.insert(member, archive.as_str());
                    }
                }
                Err(err) => log::error!("cannot read {}: {err}, skipping", file.display()),
            }
        }
        log::info!("archive location cache holds {} members", cache.len());
        Ok(cache)
    }

    /// Load the cache from `cache_file`, building and saving it first when
    /// the file does not exist.
    pub fn load_or_build(
        cache_file: &Path,
        game_path: &Path,
        compression: &Compression,
        format: &dyn ArchiveFormat,
    ) -> Result<Self, ArchiveError> {
        if cache_file.is_file() {
            log::debug!("loading archive location cache {}", cache_file.display());
            return Self::load(cache_file);
        }
        let cache = Self::build(game_path, compression, format)?;
        cache.save(cache_file)?;
        Ok(cache)
    }
}
