// Path rules shared by the overlay operations.

use std::path::{Component, Path, PathBuf};

use crate::handler::HandlerRegistry;
use crate::io::has_suffix;

use super::OverlayError;

pub const ROMFS: &str = "romfs";
/// Folder holding the record-table files.
pub const GAME_DATA_DIR: &str = "GameData";
pub const GAME_DATA_PREFIX: &str = "GameDataList.Product";
pub const CHANGELOG_FILE: &str = "GameDataList.gdlchangelog";

const EXCLUDED_FOLDERS: &[&str] = &["RSDB"];
const EXCLUDED_SUFFIXES: &[&str] = &[".rstbl.byml", ".rstbl.byml.zs"];

/// The `romfs` folder of a mod when it has one, otherwise the folder itself.
pub fn romfs_root(mod_path: &Path) -> PathBuf {
    let romfs = mod_path.join(ROMFS);
    if romfs.is_dir() {
        romfs
    } else {
        mod_path.to_path_buf()
    }
}

/// `file` relative to `root`.
pub fn relative(root: &Path, file: &Path) -> Result<PathBuf, OverlayError> {
    file.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| OverlayError::OutsideRoot {
            root: root.to_path_buf(),
            file: file.to_path_buf(),
        })
}

/// `relative` without any `romfs` segment, as found in the game tree.
pub fn strip_romfs(relative: &Path) -> PathBuf {
    relative
        .components()
        .filter(|c| !matches!(c, Component::Normal(part) if *part == ROMFS))
        .collect()
}

/// `/`-separated form of a relative path, used as a handler file name.
pub fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn is_game_data_product(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(GAME_DATA_PREFIX))
}

/// Whether a non-archive file takes part in flat packaging and merging:
/// a registered handler serves it and it is not one of the resource-table
/// or record-table files handled elsewhere.
pub fn is_flat_file(handlers: &HandlerRegistry, relative: &Path) -> bool {
    let name = slash_path(relative);
    if !handlers.supports(&name) {
        return false;
    }
    let in_excluded_folder = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .any(|c| matches!(c, Component::Normal(part) if EXCLUDED_FOLDERS.iter().any(|f| part == *f)));
    if in_excluded_folder {
        return false;
    }
    if EXCLUDED_SUFFIXES.iter().any(|s| has_suffix(relative, s)) {
        return false;
    }
    !is_game_data_product(relative)
}
