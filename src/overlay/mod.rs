// Overlay orchestration: packaging a mod against the game tree, merging
// packaged mods by priority, and assembling loose files back into archives.
//
// Each operation walks its input tree once, in sorted order, on the calling
// thread. `spawn()` moves the whole operation onto a background thread.

mod assemble;
mod merge;
mod package;
pub mod paths;
mod shops;

pub use assemble::Assembler;
pub use merge::Merger;
pub use package::Packager;
pub use shops::{SHOP_CAPACITY, ShopsOverflow, shop_param_key};

use std::fmt;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::archive::{ArchiveEntries, ArchiveError, ArchiveFormat, ArchiveLocationCache, PackedArchiveFormat};
use crate::compress::Compression;
use crate::config::{Config, ConfigError};
use crate::document::{DocumentCodec, DocumentError, NativeCodec};
use crate::gdl::ChangelogError;
use crate::handler::HandlerRegistry;
use crate::io::{self as fsio, IoError};
use crate::lazy::LazyShared;
use crate::patch::PatchError;
use crate::vanilla::{
    ContentHasher, DEFAULT_VERSIONS, FingerprintError, FingerprintIndex, Sha256Hasher, VanillaOracle,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OverlayError {
    /// An archive that cannot be decoded. Callers fall back to copying it.
    #[error("invalid archive {}: {source}", path.display())]
    InvalidContainer { path: PathBuf, source: ArchiveError },
    #[error("reference file {} not found", .0.display())]
    MissingReference(PathBuf),
    #[error("mod folder {} does not exist", .0.display())]
    MissingMod(PathBuf),
    #[error("{} is outside {}", file.display(), root.display())]
    OutsideRoot { root: PathBuf, file: PathBuf },
    #[error("worker thread panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Changelog(#[from] ChangelogError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl OverlayError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io(IoError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Counters collected over one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Files written after a diff or merge.
    pub written: usize,
    /// Files left out because they match the game tree.
    pub elided: usize,
    /// Files copied verbatim.
    pub copied: usize,
    /// Recovered conditions that were logged as warnings.
    pub warnings: usize,
}

impl AddAssign for Report {
    fn add_assign(&mut self, other: Report) {
        self.written += other.written;
        self.elided += other.elided;
        self.copied += other.copied;
        self.warnings += other.warnings;
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} elided, {} copied verbatim, {} warnings",
            self.written, self.elided, self.copied, self.warnings
        )
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Collaborators and shared indexes for one or more operations.
///
/// Cloning is cheap; clones share the lazily built fingerprint index and
/// archive location cache.
#[derive(Clone)]
pub struct Context {
    game_path: PathBuf,
    handlers: HandlerRegistry,
    codec: Arc<dyn DocumentCodec>,
    format: Arc<dyn ArchiveFormat>,
    compression: Arc<Compression>,
    hasher: Arc<dyn ContentHasher>,
    versions: Vec<u32>,
    checksum_path: PathBuf,
    archive_cache_path: PathBuf,
    shops_path: PathBuf,
    fingerprints: Arc<LazyShared<FingerprintIndex>>,
    archive_cache: Arc<LazyShared<ArchiveLocationCache>>,
}

impl Context {
    /// Context over `game_path` with the built-in codec, archive format and
    /// handlers. Index files default to the game directory.
    pub fn new(game_path: impl Into<PathBuf>) -> Self {
        let game_path = game_path.into();
        let codec: Arc<dyn DocumentCodec> = Arc::new(NativeCodec);
        Self {
            handlers: HandlerRegistry::with_defaults(Arc::clone(&codec)),
            codec,
            format: Arc::new(PackedArchiveFormat),
            compression: Arc::new(Compression::default()),
            hasher: Arc::new(Sha256Hasher),
            versions: DEFAULT_VERSIONS.to_vec(),
            checksum_path: game_path.join(crate::config::CHECKSUM_FILE),
            archive_cache_path: game_path.join(crate::config::ARCHIVE_CACHE_FILE),
            shops_path: game_path.join(crate::config::SHOPS_FILE),
            fingerprints: Arc::new(LazyShared::new()),
            archive_cache: Arc::new(LazyShared::new()),
            game_path,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.game_path)
            .with_compression(config.compression.build())
            .with_versions(&config.versions())
            .with_checksum_path(config.checksum_path())
            .with_archive_cache_path(config.archive_cache_path())
            .with_shops_path(config.shops_path())
    }

    /// Replace the codec. The registry is rebuilt around it.
    pub fn with_codec(mut self, codec: Arc<dyn DocumentCodec>) -> Self {
        self.handlers = HandlerRegistry::with_defaults(Arc::clone(&codec));
        self.codec = codec;
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_archive_format(mut self, format: Arc<dyn ArchiveFormat>) -> Self {
        self.format = format;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Arc::new(compression);
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_versions(mut self, versions: &[u32]) -> Self {
        self.versions = versions.to_vec();
        self
    }

    pub fn with_checksum_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checksum_path = path.into();
        self.fingerprints = Arc::new(LazyShared::new());
        self
    }

    pub fn with_archive_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_cache_path = path.into();
        self.archive_cache = Arc::new(LazyShared::new());
        self
    }

    pub fn with_shops_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.shops_path = path.into();
        self
    }

    /// Use an already loaded fingerprint index instead of reading one.
    pub fn with_fingerprints(mut self, index: FingerprintIndex) -> Self {
        self.fingerprints = Arc::new(LazyShared::ready(index));
        self
    }

    /// Use an already built location cache instead of loading one.
    pub fn with_archive_cache(mut self, cache: ArchiveLocationCache) -> Self {
        self.archive_cache = Arc::new(LazyShared::ready(cache));
        self
    }

    pub fn game_path(&self) -> &Path {
        &self.game_path
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn codec(&self) -> &dyn DocumentCodec {
        self.codec.as_ref()
    }

    pub fn archive_format(&self) -> &dyn ArchiveFormat {
        self.format.as_ref()
    }

    pub fn compression(&self) -> &Compression {
        &self.compression
    }

    pub fn versions(&self) -> &[u32] {
        &self.versions
    }

    pub fn shops_path(&self) -> &Path {
        &self.shops_path
    }

    /// Vanilla oracle over the fingerprint index, loading the index on first
    /// use.
    pub fn oracle(&self) -> Result<VanillaOracle, OverlayError> {
        let index = self
            .fingerprints
            .get_or_try_build(|| FingerprintIndex::load(&self.checksum_path))?;
        Ok(VanillaOracle::new(
            index,
            Arc::clone(&self.hasher),
            &self.versions,
        ))
    }

    /// The archive location cache, loaded from disk or built from the game
    /// tree on first use.
    pub fn archive_cache(&self) -> Result<Arc<ArchiveLocationCache>, OverlayError> {
        Ok(self.archive_cache.get_or_try_build(|| {
            ArchiveLocationCache::load_or_build(
                &self.archive_cache_path,
                &self.game_path,
                &self.compression,
                self.format.as_ref(),
            )
        })?)
    }

    // -----------------------------------------------------------------------
    // File helpers shared by the operations
    // -----------------------------------------------------------------------

    pub(crate) fn read(&self, path: &Path) -> Result<Vec<u8>, OverlayError> {
        Ok(fsio::read_content(path, &self.compression)?)
    }

    pub(crate) fn write(&self, path: &Path, data: &[u8]) -> Result<(), OverlayError> {
        Ok(fsio::write_content(path, data, &self.compression)?)
    }

    /// Read and decode an archive. Decoding failures are `InvalidContainer`.
    pub(crate) fn read_archive(&self, path: &Path) -> Result<ArchiveEntries, OverlayError> {
        let bytes = self.read(path)?;
        self.format
            .decode(&bytes)
            .map_err(|source| OverlayError::InvalidContainer {
                path: path.to_path_buf(),
                source,
            })
    }

    pub(crate) fn write_archive(
        &self,
        path: &Path,
        entries: &ArchiveEntries,
    ) -> Result<(), OverlayError> {
        let bytes = self.format.encode(entries)?;
        self.write(path, &bytes)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("game_path", &self.game_path)
            .field("handlers", &self.handlers)
            .field("compression", &self.compression)
            .field("versions", &self.versions)
            .field("checksum_path", &self.checksum_path)
            .field("archive_cache_path", &self.archive_cache_path)
            .field("shops_path", &self.shops_path)
            .finish()
    }
}

/// Join a worker thread, turning a panic into an error.
pub fn join(
    handle: std::thread::JoinHandle<Result<Report, OverlayError>>,
) -> Result<Report, OverlayError> {
    handle.join().map_err(|_| OverlayError::WorkerPanicked)?
}
