// Assembling: move loose documents of a mod back into the archives that
// embed them in the game tree.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crate::compress::COMPRESSED_SUFFIX;
use crate::io::{copy_file, has_suffix, remove_file, walk_files};
use crate::vanilla::canonical_path;

use super::{Context, OverlayError, Report, paths};

const LOOSE_EXTENSIONS: &[&str] = &["byml", "byaml"];

pub struct Assembler {
    ctx: Context,
    mod_root: PathBuf,
}

impl Assembler {
    pub fn new(ctx: Context, mod_path: impl AsRef<Path>) -> Self {
        Self {
            ctx,
            mod_root: paths::romfs_root(mod_path.as_ref()),
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<Report, OverlayError>> {
        thread::spawn(move || self.run())
    }

    pub fn run(&self) -> Result<Report, OverlayError> {
        if !self.mod_root.is_dir() {
            return Err(OverlayError::MissingMod(self.mod_root.clone()));
        }
        let cache = self.ctx.archive_cache()?;
        let files = walk_files(&self.mod_root).map_err(|e| OverlayError::io(&self.mod_root, e))?;
        let mut report = Report::default();

        for file in files.iter().filter(|f| is_loose_document(f)) {
            let Some(member) = canonical_path(&self.mod_root, file) else {
                continue;
            };
            let Some(archive) = cache.archive_of(&member) else {
                continue;
            };
            if self.assemble(file, &member, archive)? {
                remove_file(file)?;
                log::info!("assembled {member} into {archive}");
                report.written += 1;
            } else {
                log::warn!("skipping {} - could not assemble", file.display());
                report.warnings += 1;
            }
        }

        log::info!("assembled {}: {report}", self.mod_root.display());
        Ok(report)
    }

    /// Put `file` into the mod's copy of `archive`. Returns false when
    /// neither the mod nor the game tree has the archive, or it cannot be
    /// decoded.
    fn assemble(&self, file: &Path, member: &str, archive: &str) -> Result<bool, OverlayError> {
        let Some(archive_path) = self.locate_archive(archive)? else {
            return Ok(false);
        };
        let mut entries = match self.ctx.read_archive(&archive_path) {
            Ok(entries) => entries,
            Err(OverlayError::InvalidContainer { path, source }) => {
                log::warn!("invalid archive {}: {source}", path.display());
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        entries.put(member, self.ctx.read(file)?);
        self.ctx.write_archive(&archive_path, &entries)?;
        Ok(true)
    }

    /// The mod's copy of `archive`, plain or compressed, copied in from the
    /// game tree when the mod does not carry it yet.
    fn locate_archive(&self, archive: &str) -> Result<Option<PathBuf>, OverlayError> {
        for candidate in with_compressed(&self.mod_root.join(archive)) {
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
        for original in with_compressed(&self.ctx.game_path().join(archive)) {
            if original.is_file() {
                let name = paths::relative(self.ctx.game_path(), &original)?;
                let target = self.mod_root.join(name);
                copy_file(&original, &target)?;
                return Ok(Some(target));
            }
        }
        Ok(None)
    }
}

fn with_compressed(path: &Path) -> [PathBuf; 2] {
    let mut compressed = path.as_os_str().to_owned();
    compressed.push(COMPRESSED_SUFFIX);
    [path.to_path_buf(), PathBuf::from(compressed)]
}

fn is_loose_document(path: &Path) -> bool {
    LOOSE_EXTENSIONS.iter().any(|ext| {
        has_suffix(path, &format!(".{ext}")) || has_suffix(path, &format!(".{ext}{COMPRESSED_SUFFIX}"))
    })
}
