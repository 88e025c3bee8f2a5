// Merging: fold packaged mods onto the game tree, lowest priority first.
//
// Output mirrors the game tree layout directly below `<output>`. A file the
// output does not have yet is seeded from the game tree, or copied from the
// mod when the game tree lacks it too.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crate::archive::is_archive_path;
use crate::config::ShopsEntry;
use crate::gdl;
use crate::io::{copy_file, file_name, has_suffix, remove_file, walk_files};

use super::paths::{
    self, CHANGELOG_FILE, GAME_DATA_DIR, is_flat_file, is_game_data_product, relative, strip_romfs,
};
use super::shops::ShopsOverflow;
use super::{Context, OverlayError, Report};

pub struct Merger {
    ctx: Context,
    mods: Vec<PathBuf>,
    output: PathBuf,
}

/// What seeding a missing output file did.
enum Seed {
    /// The output already had the file, or it was copied from the game tree.
    Ready,
    /// The mod's file was copied; there is nothing left to merge.
    CopiedFromMod,
}

impl Merger {
    /// `mods` are mod folders in ascending priority: later mods win.
    pub fn new<P: AsRef<Path>>(
        ctx: Context,
        mods: impl IntoIterator<Item = P>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctx,
            mods: mods.into_iter().map(|m| m.as_ref().to_path_buf()).collect(),
            output: output.into(),
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<Report, OverlayError>> {
        thread::spawn(move || self.run())
    }

    pub fn run(&self) -> Result<Report, OverlayError> {
        let mut report = Report::default();
        if let Some(missing) = self.mods.iter().find(|m| !m.is_dir()) {
            return Err(OverlayError::MissingMod(missing.clone()));
        }

        self.clean_archives()?;
        for mod_path in &self.mods {
            log::info!("merging archives of {}", mod_path.display());
            self.merge_archives(mod_path, &mut report)?;
        }

        log::info!("merging shops");
        let shops = ShopsEntry::load(self.ctx.shops_path())?;
        ShopsOverflow::new(&self.ctx, &self.output, &shops).run(&mut report)?;

        for mod_path in &self.mods {
            log::info!("merging flat files of {}", mod_path.display());
            self.merge_flat_files(mod_path, &mut report)?;
            self.merge_game_data(mod_path, &mut report)?;
        }

        log::info!("merged {} mods into {}: {report}", self.mods.len(), self.output.display());
        Ok(report)
    }

    /// Archives from an earlier run would otherwise be merged into twice.
    fn clean_archives(&self) -> Result<(), OverlayError> {
        if !self.output.is_dir() {
            return Ok(());
        }
        log::warn!("cleaning existing archives in {}", self.output.display());
        let files = walk_files(&self.output).map_err(|e| OverlayError::io(&self.output, e))?;
        for file in files.iter().filter(|f| is_archive_path(f)) {
            remove_file(file)?;
        }
        Ok(())
    }

    /// Make sure `target` exists before merging `file` into it.
    fn seed(&self, file: &Path, rel: &Path, target: &Path) -> Result<Seed, OverlayError> {
        if target.is_file() {
            return Ok(Seed::Ready);
        }
        let original = self.ctx.game_path().join(strip_romfs(rel));
        if original.is_file() {
            copy_file(&original, target)?;
            return Ok(Seed::Ready);
        }
        copy_file(file, target)?;
        Ok(Seed::CopiedFromMod)
    }

    // -----------------------------------------------------------------------
    // Archives
    // -----------------------------------------------------------------------

    fn merge_archives(&self, mod_path: &Path, report: &mut Report) -> Result<(), OverlayError> {
        let root = paths::romfs_root(mod_path);
        let files = walk_files(&root).map_err(|e| OverlayError::io(&root, e))?;
        for file in files.iter().filter(|f| is_archive_path(f)) {
            let rel = relative(&root, file)?;
            let target = self.output.join(&rel);
            log::info!("{}: merging {}", mod_path.display(), rel.display());
            match self.merge_archive(file, &rel, &target, report) {
                Ok(()) => {}
                Err(OverlayError::InvalidContainer { path, source }) => {
                    log::warn!(
                        "invalid archive {}: {source}, overwriting by priority",
                        path.display()
                    );
                    copy_file(file, &target)?;
                    report.copied += 1;
                    report.warnings += 1;
                }
                Err(err) => {
                    log::error!("failed to merge {}: {err}", file.display());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn merge_archive(
        &self,
        file: &Path,
        rel: &Path,
        target: &Path,
        report: &mut Report,
    ) -> Result<(), OverlayError> {
        if let Seed::CopiedFromMod = self.seed(file, rel, target)? {
            report.copied += 1;
            return Ok(());
        }

        let source = self.ctx.read_archive(file)?;
        let mut merged = self.ctx.read_archive(target)?;
        for (member, data) in source.iter() {
            let next = match merged.get(member) {
                None => data.to_vec(),
                Some(base) => match self.ctx.handlers().for_name(member) {
                    Some(handler) => handler.merge(member, base, &[data])?,
                    None => {
                        log::warn!(
                            "no handler for {member} - overwriting it in {}",
                            target.display()
                        );
                        report.warnings += 1;
                        data.to_vec()
                    }
                },
            };
            merged.put(member, next);
        }
        self.ctx.write_archive(target, &merged)?;
        report.written += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Flat files
    // -----------------------------------------------------------------------

    fn merge_flat_files(&self, mod_path: &Path, report: &mut Report) -> Result<(), OverlayError> {
        let root = paths::romfs_root(mod_path);
        let files = walk_files(&root).map_err(|e| OverlayError::io(&root, e))?;
        for file in files.iter().filter(|f| !is_archive_path(f)) {
            let rel = relative(&root, file)?;
            if !is_flat_file(self.ctx.handlers(), &rel) {
                continue;
            }
            self.merge_flat(file, &rel, report).inspect_err(|e| {
                log::error!("failed to merge {}: {e}", file.display());
            })?;
            log::info!("merged {} into {}", file.display(), rel.display());
        }
        Ok(())
    }

    fn merge_flat(&self, file: &Path, rel: &Path, report: &mut Report) -> Result<(), OverlayError> {
        let target = self.output.join(rel);
        if let Seed::CopiedFromMod = self.seed(file, rel, &target)? {
            report.copied += 1;
            return Ok(());
        }

        let name = paths::slash_path(rel);
        let Some(handler) = self.ctx.handlers().for_name(&name) else {
            log::warn!("no handler for {name} - overwriting contents");
            copy_file(file, &target)?;
            report.copied += 1;
            report.warnings += 1;
            return Ok(());
        };
        let overlay = self.ctx.read(file)?;
        let base = self.ctx.read(&target)?;
        let merged = handler.merge(&name, &base, &[overlay.as_slice()])?;
        self.ctx.write(&target, &merged)?;
        report.written += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Record tables
    // -----------------------------------------------------------------------

    fn merge_game_data(&self, mod_path: &Path, report: &mut Report) -> Result<(), OverlayError> {
        let changelog_path = paths::romfs_root(mod_path)
            .join(GAME_DATA_DIR)
            .join(CHANGELOG_FILE);
        if !changelog_path.is_file() {
            return Ok(());
        }
        log::info!("applying record-table changelog of {}", mod_path.display());

        let original_dir = self.ctx.game_path().join(GAME_DATA_DIR);
        if !original_dir.is_dir() {
            return Err(OverlayError::MissingReference(original_dir));
        }
        let output_dir = self.output.join(GAME_DATA_DIR);
        for original in self.product_files(&original_dir)? {
            if !has_suffix(&original, ".byml.zs") {
                continue;
            }
            let target = output_dir.join(file_name(&original));
            if !target.exists() {
                copy_file(&original, &target)?;
                report.copied += 1;
            }
        }

        let changelog =
            fs::read(&changelog_path).map_err(|e| OverlayError::io(&changelog_path, e))?;
        for product in self.product_files(&output_dir)? {
            let base = self.ctx.read(&product)?;
            let merged = gdl::merge_bytes(self.ctx.codec(), &base, &changelog)
                .inspect_err(|e| log::error!("failed to apply changelog to {}: {e}", product.display()))?;
            self.ctx.write(&product, &merged)?;
            log::info!("merged record-table changelog into {}", product.display());
            report.written += 1;
        }

        let stale = output_dir.join(CHANGELOG_FILE);
        if stale.is_file() {
            remove_file(&stale)?;
        }
        Ok(())
    }

    /// Record-table files directly inside `dir`.
    fn product_files(&self, dir: &Path) -> Result<Vec<PathBuf>, OverlayError> {
        let files = walk_files(dir).map_err(|e| OverlayError::io(dir, e))?;
        Ok(files
            .into_iter()
            .filter(|f| f.parent() == Some(dir) && is_game_data_product(f))
            .collect())
    }
}
