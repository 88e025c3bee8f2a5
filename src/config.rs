// Run configuration.
//
// `config.json` lives in the local data directory under `Totk` and names the
// unmodified game tree. The fingerprint index and the archive location cache
// default to files next to it; the shop list defaults to `tkmm/shops.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compress::{Compression, NoCompression};
use crate::vanilla::DEFAULT_VERSIONS;

pub const CONFIG_FILE: &str = "config.json";
pub const CHECKSUM_FILE: &str = "checksums.bin";
pub const ARCHIVE_CACHE_FILE: &str = "archivemappings.bin";
pub const SHOPS_FILE: &str = "shops.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not found")]
    NotFound(PathBuf),
    #[error("game path is not set in the configuration")]
    MissingGamePath,
    #[error("game path {0} is not a directory")]
    GamePathNotFound(PathBuf),
    #[error("local data directory could not be determined")]
    NoDataDirectory,
    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Backend used for `.zs` files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    #[default]
    Zlib,
    Lzma,
    None,
}

impl CompressionKind {
    /// Build the per-profile contexts. Kinds whose feature is disabled fall
    /// back to storing data unchanged.
    pub fn build(self) -> Compression {
        match self {
            #[cfg(feature = "zlib")]
            Self::Zlib => Compression::new(|_| Box::new(crate::compress::ZlibBackend::default())),
            #[cfg(feature = "lzma")]
            Self::Lzma => Compression::new(|_| Box::new(crate::compress::LzmaBackend)),
            #[allow(unreachable_patterns)]
            other => {
                if other != Self::None {
                    log::warn!("{other:?} compression is not compiled in, storing data unchanged");
                }
                Compression::new(|_| Box::new(NoCompression))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Root of the unmodified game tree.
    #[serde(default)]
    pub game_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shops_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<u32>>,
    #[serde(default)]
    pub compression: CompressionKind,
    /// Directory the configuration was loaded from.
    #[serde(skip)]
    pub dir: PathBuf,
}

impl Config {
    /// `<local data>/Totk`.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        BaseDirs::new()
            .map(|dirs| dirs.data_local_dir().join("Totk"))
            .ok_or(ConfigError::NoDataDirectory)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::default_dir()?.join(CONFIG_FILE))
    }

    /// Load `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }
        let text = fs::read_to_string(&path)?;
        let mut config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// A configuration for `game_path` with every other value defaulted.
    pub fn for_game(game_path: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            game_path: game_path.into(),
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingGamePath);
        }
        if !self.game_path.is_dir() {
            return Err(ConfigError::GamePathNotFound(self.game_path.clone()));
        }
        Ok(())
    }

    pub fn checksum_path(&self) -> PathBuf {
        self.checksum_path
            .clone()
            .unwrap_or_else(|| self.dir.join(CHECKSUM_FILE))
    }

    pub fn archive_cache_path(&self) -> PathBuf {
        self.dir.join(ARCHIVE_CACHE_FILE)
    }

    /// Explicit shop list, else `tkmm/shops.json` beside the config directory.
    pub fn shops_path(&self) -> PathBuf {
        self.shops_path.clone().unwrap_or_else(|| {
            self.dir
                .parent()
                .unwrap_or(&self.dir)
                .join("tkmm")
                .join(SHOPS_FILE)
        })
    }

    pub fn versions(&self) -> Vec<u32> {
        match &self.versions {
            Some(versions) if !versions.is_empty() => versions.clone(),
            _ => DEFAULT_VERSIONS.to_vec(),
        }
    }
}

/// One entry of `shops.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopsEntry {
    #[serde(rename = "NPC ActorName")]
    pub actor_name: String,
}

impl ShopsEntry {
    /// Read a shop list. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Vec<ShopsEntry>, ConfigError> {
        if !path.is_file() {
            log::debug!("no shop list at {}", path.display());
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
