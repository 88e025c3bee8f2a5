// Packaging: reduce a mod to what differs from the game tree.
//
// Output mirrors the mod below `<output>/romfs`. Archives keep only members
// that differ from vanilla, each replaced by its patch where the game tree
// has the member. Flat documents become patches. Record-table files produce
// at most one changelog.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crate::archive::is_archive_path;
use crate::gdl;
use crate::io::{copy_file, walk_files};
use crate::vanilla::{VanillaOracle, canonical_path};

use super::paths::{
    self, CHANGELOG_FILE, GAME_DATA_DIR, ROMFS, is_flat_file, relative, strip_romfs,
};
use super::{Context, OverlayError, Report};

enum Outcome {
    Elided,
    Write(Vec<u8>),
}

pub struct Packager {
    ctx: Context,
    mod_root: PathBuf,
    output: PathBuf,
}

impl Packager {
    /// Package the mod at `mod_path` (its `romfs` folder, or a folder that
    /// contains one) into `output`.
    pub fn new(ctx: Context, mod_path: impl AsRef<Path>, output: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            mod_root: paths::romfs_root(mod_path.as_ref()),
            output: output.into(),
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<Report, OverlayError>> {
        thread::spawn(move || self.run())
    }

    pub fn run(&self) -> Result<Report, OverlayError> {
        if !self.mod_root.is_dir() {
            return Err(OverlayError::MissingMod(self.mod_root.clone()));
        }
        let oracle = self.ctx.oracle()?;
        let files =
            walk_files(&self.mod_root).map_err(|e| OverlayError::io(&self.mod_root, e))?;
        let mut report = Report::default();

        log::info!("packaging archives from {}", self.mod_root.display());
        for file in files.iter().filter(|f| is_archive_path(f)) {
            self.package_archive_file(file, &oracle, &mut report)?;
        }

        log::info!("packaging flat files to {}", self.output.display());
        for file in files.iter().filter(|f| !is_archive_path(f)) {
            let rel = relative(&self.mod_root, file)?;
            if is_flat_file(self.ctx.handlers(), &rel) {
                self.package_flat(file, &rel, &oracle, &mut report)?;
            }
        }

        log::info!("creating record-table changelog");
        self.package_game_data(&mut report)?;

        log::info!("packaged {}: {report}", self.mod_root.display());
        Ok(report)
    }

    fn target(&self, rel: &Path) -> PathBuf {
        self.output.join(ROMFS).join(rel)
    }

    fn canonical(&self, file: &Path) -> Result<String, OverlayError> {
        canonical_path(&self.mod_root, file).ok_or_else(|| OverlayError::OutsideRoot {
            root: self.mod_root.clone(),
            file: file.to_path_buf(),
        })
    }

    // -----------------------------------------------------------------------
    // Archives
    // -----------------------------------------------------------------------

    fn package_archive_file(
        &self,
        file: &Path,
        oracle: &VanillaOracle,
        report: &mut Report,
    ) -> Result<(), OverlayError> {
        let rel = relative(&self.mod_root, file)?;
        let target = self.target(&rel);
        match self.package_archive(file, &rel, oracle, report) {
            Ok(Outcome::Elided) => {
                log::info!("omitting {}: same as vanilla", rel.display());
                report.elided += 1;
            }
            Ok(Outcome::Write(bytes)) => {
                if target.exists() {
                    log::warn!("overwriting {}", target.display());
                    report.warnings += 1;
                }
                self.ctx.write(&target, &bytes)?;
                log::info!("packaged {}", target.display());
                report.written += 1;
            }
            Err(OverlayError::InvalidContainer { path, source }) => {
                log::warn!("{}: {source}, copying verbatim", path.display());
                copy_file(file, &target)?;
                report.copied += 1;
                report.warnings += 1;
            }
            Err(err) => {
                log::error!("failed to package {}: {err}", file.display());
                return Err(err);
            }
        }
        Ok(())
    }

    fn package_archive(
        &self,
        file: &Path,
        rel: &Path,
        oracle: &VanillaOracle,
        report: &mut Report,
    ) -> Result<Outcome, OverlayError> {
        let canonical = self.canonical(file)?;
        let content = self.ctx.read(file)?;

        let whole = oracle.check(&canonical, &content);
        if whole.vanilla {
            return Ok(Outcome::Elided);
        }

        let mut entries = self
            .ctx
            .archive_format()
            .decode(&content)
            .map_err(|source| OverlayError::InvalidContainer {
                path: file.to_path_buf(),
                source,
            })?;
        let reference_path = self.ctx.game_path().join(strip_romfs(rel));
        let reference = if reference_path.is_file() {
            Some(self.ctx.read_archive(&reference_path)?)
        } else {
            log::debug!("{canonical} has no reference archive");
            None
        };

        let mut vanilla_members = Vec::new();
        let mut patched = Vec::new();
        let mut replaced = false;
        for (member, data) in entries.iter() {
            let key = VanillaOracle::member_key(&canonical, member);
            if oracle.is_vanilla(&key, data) {
                log::debug!("{canonical}: {member} is vanilla");
                vanilla_members.push(member.to_owned());
                continue;
            }
            let Some(original) = reference.as_ref().and_then(|r| r.get(member)) else {
                continue;
            };
            replaced = true;

            let Some(handler) = self.ctx.handlers().for_name(member) else {
                log::warn!("no handler for {member} in {}, including as-is", rel.display());
                report.warnings += 1;
                continue;
            };
            let packaged = handler.package(member, original, data)?;
            patched.push((member.to_owned(), packaged.bytes));
        }

        if vanilla_members.is_empty() && !replaced && whole.entry_found {
            return Ok(Outcome::Elided);
        }

        for member in &vanilla_members {
            entries.remove(member);
        }
        for (member, bytes) in patched {
            entries.put(member, bytes);
        }
        Ok(Outcome::Write(self.ctx.archive_format().encode(&entries)?))
    }

    // -----------------------------------------------------------------------
    // Flat files
    // -----------------------------------------------------------------------

    fn package_flat(
        &self,
        file: &Path,
        rel: &Path,
        oracle: &VanillaOracle,
        report: &mut Report,
    ) -> Result<(), OverlayError> {
        let target = self.target(rel);
        let reference_path = self.ctx.game_path().join(strip_romfs(rel));
        if !reference_path.is_file() {
            log::debug!("{} is new, copying", rel.display());
            copy_file(file, &target)?;
            report.copied += 1;
            return Ok(());
        }

        let modified = self.ctx.read(file)?;
        if oracle.is_vanilla(&self.canonical(file)?, &modified) {
            log::info!("omitting {}: same as vanilla", rel.display());
            report.elided += 1;
            return Ok(());
        }

        let name = paths::slash_path(rel);
        let Some(handler) = self.ctx.handlers().for_name(&name) else {
            log::warn!("no handler for {name}, overwriting contents");
            copy_file(file, &target)?;
            report.copied += 1;
            report.warnings += 1;
            return Ok(());
        };
        let reference = self.ctx.read(&reference_path)?;
        let packaged = handler.package(&name, &reference, &modified).inspect_err(|e| {
            log::error!("failed to package {name}: {e}");
        })?;
        if packaged.is_empty {
            log::info!("omitting {name}: no changes");
            report.elided += 1;
            return Ok(());
        }
        self.ctx.write(&target, &packaged.bytes)?;
        log::info!("packaged {}", target.display());
        report.written += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Record tables
    // -----------------------------------------------------------------------

    fn package_game_data(&self, report: &mut Report) -> Result<(), OverlayError> {
        let dir = self.mod_root.join(GAME_DATA_DIR);
        let files = walk_files(&dir).map_err(|e| OverlayError::io(&dir, e))?;
        for file in files
            .iter()
            .filter(|f| f.parent() == Some(dir.as_path()) && paths::is_game_data_product(f))
        {
            let name = crate::io::file_name(file);
            let reference_path = self.ctx.game_path().join(GAME_DATA_DIR).join(&name);
            if !reference_path.is_file() {
                log::error!("no reference record-table file for {name}");
                return Err(OverlayError::MissingReference(reference_path));
            }
            let reference = self.ctx.read(&reference_path)?;
            let modified = self.ctx.read(file)?;
            let changelog = gdl::package_bytes(self.ctx.codec(), &reference, &modified)
                .inspect_err(|e| log::error!("failed to create changelog for {name}: {e}"))?;
            let Some(changelog) = changelog else {
                log::info!("no record-table changes in {name}");
                continue;
            };

            let target = self.output.join(ROMFS).join(GAME_DATA_DIR).join(CHANGELOG_FILE);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| OverlayError::io(parent, e))?;
            }
            fs::write(&target, changelog).map_err(|e| OverlayError::io(&target, e))?;
            log::info!("created record-table changelog from {name}");
            report.written += 1;
            break;
        }
        Ok(())
    }
}
