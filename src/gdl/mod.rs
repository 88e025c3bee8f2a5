// Record-table patch engine.
//
// A record-table document is a map whose `Data` entry maps table names to
// arrays of records, each record a map keyed by a stable `Hash`. Instead of
// the generic tree patch these files are diffed into a `Changelog`: one
// `Change` per added or edited record, with per-element value tags so that a
// replay only ever grows value lists.

pub mod apply;
pub mod change;
pub mod changelog;
pub mod diff;
pub mod save_data;
pub mod table;

use std::io;

use thiserror::Error;

use crate::document::{Document, DocumentCodec, DocumentError, Map};

pub use apply::apply_changelog;
pub use change::{Change, ChangeKind, Value, ValueEntry, ValueType};
pub use changelog::Changelog;
pub use diff::{compare, create_changelog};
pub use save_data::write_save_data;
pub use table::{Shape, Table};

/// Errors raised by the record-table engine.
#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("bad changelog magic")]
    BadMagic,
    #[error("unsupported changelog version {0}")]
    UnsupportedVersion(u8),
    #[error("unsupported record table {0:?}")]
    UnknownTable(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("changelog holds {0} records, more than the format can count")]
    TooManyRecords(usize),
    #[error("malformed record table: {0}")]
    Format(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl ChangelogError {
    /// The input is well formed but asks for something the engine refuses.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnknownTable(_) | Self::Unsupported(_))
    }
}

/// Key of the table map inside a record-table document.
pub const DATA: &str = "Data";
/// Key of the save-data layout map.
pub const META_DATA: &str = "MetaData";

/// The table map of a record-table document. Documents without a `Data`
/// entry are treated as being the table map themselves.
pub fn tables_of(root: &Document) -> Result<&Map, ChangelogError> {
    let map = root
        .as_map()
        .ok_or_else(|| ChangelogError::Format(format!("root is {}, expected Map", root.kind())))?;
    match map.get(DATA) {
        Some(data) => data
            .as_map()
            .ok_or_else(|| ChangelogError::Format(format!("{DATA} is {}, expected Map", data.kind()))),
        None => Ok(map),
    }
}

/// Mutable variant of [`tables_of`].
pub fn tables_of_mut(root: &mut Document) -> Result<&mut Map, ChangelogError> {
    let kind = root.kind();
    let map = root
        .as_map_mut()
        .ok_or_else(|| ChangelogError::Format(format!("root is {kind}, expected Map")))?;
    if !map.contains_key(DATA) {
        return Ok(map);
    }
    match map.get_mut(DATA) {
        Some(Document::Map(data)) => Ok(data),
        Some(other) => Err(ChangelogError::Format(format!(
            "{DATA} is {}, expected Map",
            other.kind()
        ))),
        None => Err(ChangelogError::Format(format!("{DATA} is missing"))),
    }
}

/// Read the record key of `record` as stored in `table`.
pub(crate) fn record_hash(table: Table, record: &Document) -> Result<u64, ChangelogError> {
    let hash = record
        .get("Hash")
        .ok_or_else(|| ChangelogError::Format(format!("{table}: record without Hash")))?;
    let value = if table.has_wide_keys() {
        hash.as_u64()
    } else {
        hash.as_u32().map(u64::from)
    };
    value.ok_or_else(|| ChangelogError::Format(format!("{table}: bad Hash {hash:?}")))
}

/// Decode, apply and re-encode in one step.
pub fn merge_bytes(
    codec: &dyn DocumentCodec,
    base: &[u8],
    changelog: &[u8],
) -> Result<Vec<u8>, ChangelogError> {
    let doc = codec.decode(base)?;
    let changelog = Changelog::from_bytes(changelog)?;
    let merged = apply_changelog(doc, &changelog)?;
    Ok(codec.encode(&merged)?)
}

/// Diff two encoded record-table documents. Returns `None` when they hold the
/// same records.
pub fn package_bytes(
    codec: &dyn DocumentCodec,
    reference: &[u8],
    modified: &[u8],
) -> Result<Option<Vec<u8>>, ChangelogError> {
    let reference = codec.decode(reference)?;
    let modified = codec.decode(modified)?;
    let changelog = create_changelog(&reference, &modified)?;
    if changelog.is_empty() {
        return Ok(None);
    }
    Ok(Some(changelog.to_bytes()?))
}
