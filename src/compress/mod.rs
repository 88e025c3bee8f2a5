// Compressed-file support.
//
// Game files ending in `.zs` are compressed with one of three profiles,
// chosen from the file path. Each profile owns one backend context, reused
// for the whole run and locked around every call.
//
// The built-in backends are zlib, LZMA and passthrough. Shipped game dumps
// use dictionary zstd, which none of them decode; such trees need a
// `CompressBackend` supplied through `Compression::new`.

pub mod backend;

use std::io;
use std::path::Path;

use parking_lot::Mutex;
use thiserror::Error;

#[cfg(feature = "lzma")]
pub use backend::LzmaBackend;
#[cfg(feature = "zlib")]
pub use backend::ZlibBackend;
pub use backend::{CompressBackend, NoCompression};

/// Suffix of compressed files.
pub const COMPRESSED_SUFFIX: &str = ".zs";

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("{backend}: corrupt input: {reason}")]
    Corrupt { backend: &'static str, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Dictionary profile a compressed file is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionProfile {
    Common,
    /// Table-geometry (`bcett`) files.
    TableGeometry,
    /// `.pack` archives.
    Pack,
}

impl CompressionProfile {
    pub const ALL: [CompressionProfile; 3] = [Self::Common, Self::TableGeometry, Self::Pack];

    pub fn for_path(path: &Path) -> Self {
        let path = path.to_string_lossy();
        if path.contains(".pack.") {
            Self::Pack
        } else if path.to_ascii_lowercase().contains("bcett") {
            Self::TableGeometry
        } else {
            Self::Common
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Common => 0,
            Self::TableGeometry => 1,
            Self::Pack => 2,
        }
    }
}

pub fn is_compressed_path(path: &Path) -> bool {
    path.to_string_lossy().ends_with(COMPRESSED_SUFFIX)
}

/// One backend per profile, each behind its own lock.
pub struct Compression {
    backends: [Mutex<Box<dyn CompressBackend>>; 3],
}

impl Compression {
    pub fn new(mut make: impl FnMut(CompressionProfile) -> Box<dyn CompressBackend>) -> Self {
        Self {
            backends: CompressionProfile::ALL.map(|profile| Mutex::new(make(profile))),
        }
    }

    /// Identity compression for every profile.
    pub fn passthrough() -> Self {
        Self::new(|_| Box::new(NoCompression))
    }

    pub fn compress(&self, data: &[u8], profile: CompressionProfile) -> Result<Vec<u8>, CompressError> {
        let mut backend = self.backends[profile.slot()].lock();
        Ok(backend.compress(data)?)
    }

    pub fn decompress(
        &self,
        data: &[u8],
        profile: CompressionProfile,
    ) -> Result<Vec<u8>, CompressError> {
        let mut backend = self.backends[profile.slot()].lock();
        backend.decompress(data)
    }

    /// Backend name per profile, for logging.
    pub fn describe(&self) -> String {
        CompressionProfile::ALL
            .iter()
            .map(|p| format!("{p:?}={}", self.backends[p.slot()].lock().name()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for Compression {
    #[cfg(feature = "zlib")]
    fn default() -> Self {
        Self::new(|_| Box::new(ZlibBackend::default()))
    }

    #[cfg(not(feature = "zlib"))]
    fn default() -> Self {
        Self::passthrough()
    }
}

impl std::fmt::Debug for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compression")
            .field("backends", &self.describe())
            .finish()
    }
}
