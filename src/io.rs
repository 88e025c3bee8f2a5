// File-level I/O helpers.
//
// Reads and writes game files through the per-profile compression contexts:
// paths ending in `.zs` are decompressed on read and compressed on write,
// everything else passes through untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compress::{CompressError, Compression, CompressionProfile, is_compressed_path};

/// An I/O or compression failure on a specific file.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{}: {source}", path.display())]
    Compress { path: PathBuf, source: CompressError },
}

impl IoError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Compress { path, .. } => path,
        }
    }
}

/// Read `path`, decompressing `.zs` files with the profile implied by the path.
pub fn read_content(path: &Path, compression: &Compression) -> Result<Vec<u8>, IoError> {
    let bytes = fs::read(path).map_err(|e| IoError::io(path, e))?;
    if !is_compressed_path(path) {
        return Ok(bytes);
    }
    compression
        .decompress(&bytes, CompressionProfile::for_path(path))
        .map_err(|source| IoError::Compress {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `data` to `path`, compressing `.zs` files. Parent directories are
/// created as needed.
pub fn write_content(path: &Path, data: &[u8], compression: &Compression) -> Result<(), IoError> {
    let bytes = if is_compressed_path(path) {
        compression
            .compress(data, CompressionProfile::for_path(path))
            .map_err(|source| IoError::Compress {
                path: path.to_path_buf(),
                source,
            })?
    } else {
        data.to_vec()
    };
    create_parent(path)?;
    fs::write(path, bytes).map_err(|e| IoError::io(path, e))
}

/// Copy `from` over `to`, creating parents and clearing a read-only flag the
/// copy may have inherited.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), IoError> {
    create_parent(to)?;
    fs::copy(from, to).map_err(|e| IoError::io(from, e))?;
    let mut permissions = fs::metadata(to).map_err(|e| IoError::io(to, e))?.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(to, permissions).map_err(|e| IoError::io(to, e))?;
    }
    Ok(())
}

pub fn remove_file(path: &Path) -> Result<(), IoError> {
    fs::remove_file(path).map_err(|e| IoError::io(path, e))
}

fn create_parent(path: &Path) -> Result<(), IoError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| IoError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Every regular file below `root`, sorted. A missing root yields nothing.
pub fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Whether a file name ends with `suffix`, ignoring ASCII case.
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    let name = path.to_string_lossy();
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let compression = Compression::default();
        let path = dir.path().join("a/b/Tag.byml.zs");
        let data = b"payload payload payload".repeat(20);
        write_content(&path, &data, &compression).unwrap();
        assert_eq!(read_content(&path, &compression).unwrap(), data);

        let raw = dir.path().join("plain.byml");
        write_content(&raw, b"raw", &compression).unwrap();
        assert_eq!(fs::read(&raw).unwrap(), b"raw");
    }

    #[test]
    fn walk_is_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z.txt", "a/b.txt", "a/c/d.txt"] {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"").unwrap();
        }
        let files = walk_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            [PathBuf::from("a/b.txt"), PathBuf::from("a/c/d.txt"), PathBuf::from("z.txt")]
        );
        assert!(walk_files(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn copy_clears_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("src.bin");
        fs::write(&from, b"x").unwrap();
        let mut perms = fs::metadata(&from).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&from, perms).unwrap();

        let to = dir.path().join("out/dst.bin");
        copy_file(&from, &to).unwrap();
        assert!(!fs::metadata(&to).unwrap().permissions().readonly());
        assert_eq!(fs::read(&to).unwrap(), b"x");
    }

    #[test]
    fn suffix_ignores_case() {
        assert!(has_suffix(Path::new("A/Foo.PACK.zs"), ".pack.zs"));
        assert!(!has_suffix(Path::new("zs"), ".pack.zs"));
    }
}
