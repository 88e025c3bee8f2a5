// Vanilla oracle.
//
// Decides whether a byte string is an unmodified copy of some known game
// revision, from a precomputed fingerprint index keyed by canonical path.

pub mod index;
pub mod oracle;

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

pub use index::FingerprintIndex;
pub use oracle::{ContentHasher, Lookup, Sha256Hasher, VanillaOracle};

/// Revisions checked when none are configured.
pub const DEFAULT_VERSIONS: [u32; 6] = [100, 110, 111, 112, 120, 121];

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("fingerprint index {0} not found")]
    NotFound(PathBuf),
    #[error("fingerprint index is {0} bytes, not a whole number of u64 values")]
    Truncated(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Revision-agnostic lookup path of `file` below `root`: relative, `/`
/// separated, without `romfs` segments and without a trailing `.zs`.
///
/// Returns `None` when `file` is not below `root`.
pub fn canonical_path(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let mut out = String::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            continue;
        };
        let part = part.to_string_lossy();
        if part == "romfs" {
            continue;
        }
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&part);
    }
    if let Some(stripped) = out.strip_suffix(".zs") {
        out.truncate(stripped.len());
    }
    Some(out)
}
