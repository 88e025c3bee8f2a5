// Archive containers.
//
// Game archives bundle many member files under path-like names. The engine
// only needs the listing: decode into `ArchiveEntries`, edit members, encode
// back. The concrete framing sits behind `ArchiveFormat`.

pub mod cache;

use std::io::{self, Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use thiserror::Error;

use crate::wire;

pub use cache::ArchiveLocationCache;

/// Archive extensions, without the compressed suffix.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["bfarc", "bkres", "blarc", "genvb", "pack", "ta"];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("bad archive magic")]
    BadMagic,
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u8),
    #[error("malformed archive: {0}")]
    Format(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Whether `path` names an archive, compressed or not.
pub fn is_archive_path(path: &Path) -> bool {
    let name = path.to_string_lossy().to_ascii_lowercase();
    let name = name.strip_suffix(".zs").unwrap_or(&name);
    ARCHIVE_EXTENSIONS
        .iter()
        .any(|ext| name.rsplit_once('.').is_some_and(|(_, e)| e == *ext))
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Members of one archive, in archive order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveEntries {
    members: IndexMap<String, Vec<u8>>,
}

impl ArchiveEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.members.get(name).map(Vec::as_slice)
    }

    /// Replace or append a member.
    pub fn put(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.members.insert(name.into(), data);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.members.shift_remove(name)
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.members.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<u8>)> for ArchiveEntries {
    fn from_iter<I: IntoIterator<Item = (K, Vec<u8>)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

pub trait ArchiveFormat: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<ArchiveEntries, ArchiveError>;
    fn encode(&self, entries: &ArchiveEntries) -> Result<Vec<u8>, ArchiveError>;
}

/// Built-in archive framing:
///
/// ```text
/// "MPAK" | version u8 (= 1) | count u32
/// member*: name (7-bit length-prefixed UTF-8) | size u32 | bytes
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedArchiveFormat;

impl PackedArchiveFormat {
    pub const MAGIC: &'static [u8; 4] = b"MPAK";
    pub const VERSION: u8 = 1;
}

impl ArchiveFormat for PackedArchiveFormat {
    fn decode(&self, data: &[u8]) -> Result<ArchiveEntries, ArchiveError> {
        let mut r = Cursor::new(data);
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != Self::MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        let version = r.read_u8()?;
        if version != Self::VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }
        let count = r.read_u32::<LittleEndian>()?;

        let mut entries = ArchiveEntries::new();
        for _ in 0..count {
            let name = wire::read_string(&mut r)?;
            let size = r.read_u32::<LittleEndian>()? as usize;
            let remaining = data.len() - r.position() as usize;
            if size > remaining {
                return Err(ArchiveError::Format(format!(
                    "member {name:?} claims {size} bytes, {remaining} left"
                )));
            }
            let mut bytes = vec![0u8; size];
            r.read_exact(&mut bytes)?;
            if entries.contains(&name) {
                return Err(ArchiveError::Format(format!("duplicate member {name:?}")));
            }
            entries.put(name, bytes);
        }
        if r.position() as usize != data.len() {
            return Err(ArchiveError::Format(format!(
                "{} trailing bytes",
                data.len() - r.position() as usize
            )));
        }
        Ok(entries)
    }

    fn encode(&self, entries: &ArchiveEntries) -> Result<Vec<u8>, ArchiveError> {
        let too_big = |what: &str| ArchiveError::Format(format!("{what} exceeds u32"));
        let mut out = Vec::new();
        out.extend_from_slice(Self::MAGIC);
        out.write_u8(Self::VERSION)?;
        out.write_u32::<LittleEndian>(u32::try_from(entries.len()).map_err(|_| too_big("member count"))?)?;
        for (name, data) in entries.iter() {
            wire::write_string(&mut out, name)?;
            out.write_u32::<LittleEndian>(u32::try_from(data.len()).map_err(|_| too_big(name))?)?;
            out.extend_from_slice(data);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArchiveEntries {
        [
            ("Component/ShopParam/Npc.game__component__ShopParam.bgyml", b"shop".to_vec()),
            ("Actor/Npc.engine__actor__ActorParam.bgyml", vec![0; 3]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn packed_round_trip_keeps_order() {
        let bytes = PackedArchiveFormat.encode(&sample()).unwrap();
        let decoded = PackedArchiveFormat.decode(&bytes).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(
            decoded.members().next(),
            Some("Component/ShopParam/Npc.game__component__ShopParam.bgyml")
        );
    }

    #[test]
    fn malformed_archives() {
        assert!(matches!(
            PackedArchiveFormat.decode(b"SARC\x01\0\0\0\0"),
            Err(ArchiveError::BadMagic)
        ));
        assert!(matches!(
            PackedArchiveFormat.decode(b"MPAK\x02\0\0\0\0"),
            Err(ArchiveError::UnsupportedVersion(2))
        ));
        let mut bytes = PackedArchiveFormat.encode(&sample()).unwrap();
        bytes.push(0);
        assert!(matches!(PackedArchiveFormat.decode(&bytes), Err(ArchiveError::Format(_))));
        bytes.truncate(bytes.len() - 3);
        assert!(PackedArchiveFormat.decode(&bytes).is_err());
    }

    #[test]
    fn listing_edits() {
        let mut entries = sample();
        entries.put("New.bgyml", vec![1]);
        assert!(entries.contains("New.bgyml"));
        assert_eq!(entries.remove("Actor/Npc.engine__actor__ActorParam.bgyml"), Some(vec![0; 3]));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.members().last(), Some("New.bgyml"));
    }

    #[test]
    fn archive_paths() {
        assert!(is_archive_path(Path::new("Pack/Actor/Foo.pack.zs")));
        assert!(is_archive_path(Path::new("UI/LayoutArchive/Common.blarc")));
        assert!(!is_archive_path(Path::new("RSDB/Tag.Product.byml.zs")));
        assert!(!is_archive_path(Path::new("Pack/ZsDic.pack.txt")));
    }
}
