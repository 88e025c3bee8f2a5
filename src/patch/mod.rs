// Tree patch engine.
//
// A `Patch` is a typed delta over the document tree: `diff` computes one from
// a reference and a modified document, `apply` replays it onto a base. On
// disk a patch is an ordinary `Document` in which array entries and map
// values carry reserved sentinel markers; `Patch::to_document` and
// `Patch::from_document` convert at that boundary only (see `wire`).
//
// Conflicting kinds are resolved in favour of the modified side everywhere:
// `diff` emits the modified value wholesale when the two nodes are not the
// same container kind, and `apply` overwrites whenever the patch and the
// base node cannot be merged structurally.

pub mod apply;
pub mod diff;
pub mod wire;

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::document::{Document, DocumentError, DocumentKind};

pub use apply::{apply, apply_owned};
pub use diff::diff;

/// Array entry: append.
pub const ADD: &str = "~ADD~";
/// Array entry: prepend. Accepted on apply, never produced by `diff`.
pub const INSERT: &str = "~INSERT~";
/// Array entry: replace the element at `~INDEX~`.
pub const MOD: &str = "~MOD~";
/// Array entry: remove the element at `~INDEX~`. As a map value: remove the key.
pub const DEL: &str = "~DEL~";
/// Base-array position paired with `~MOD~` / `~DEL~`.
pub const INDEX: &str = "~INDEX~";

// ---------------------------------------------------------------------------
// Patch tree
// ---------------------------------------------------------------------------

/// A delta against a document node.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Ordered array operations.
    Array(Vec<ArrayOp>),
    /// Per-key operations on a string-keyed map.
    Map(IndexMap<String, EntryOp>),
    /// Per-key operations on a uint32-keyed hash map.
    HashMap32(BTreeMap<u32, EntryOp>),
    /// Per-key operations on a uint64-keyed hash map.
    HashMap64(BTreeMap<u64, EntryOp>),
    /// Replace the node wholesale.
    Value(Document),
}

/// One entry of an array patch.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOp {
    Add(Document),
    Insert(Document),
    /// `index` addresses the base array as it was before this patch's
    /// deletions took effect.
    Modify { index: usize, payload: Patch },
    /// `stale` is the removed value, kept for readers of the patch only.
    Delete { index: usize, stale: Document },
    /// An ordinary element with no sentinel marker. Ignored by `apply`,
    /// preserved by the wire conversion.
    Literal(Document),
}

/// One entry of a keyed-container patch.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOp {
    Delete,
    Set(Patch),
}

impl Patch {
    /// A patch that changes nothing on a node of `kind`.
    pub fn empty(kind: DocumentKind) -> Option<Patch> {
        match kind {
            DocumentKind::Array => Some(Patch::Array(Vec::new())),
            DocumentKind::Map => Some(Patch::Map(IndexMap::new())),
            DocumentKind::HashMap32 => Some(Patch::HashMap32(BTreeMap::new())),
            DocumentKind::HashMap64 => Some(Patch::HashMap64(BTreeMap::new())),
            _ => None,
        }
    }

    /// True when the root container carries no entries at all. A wholesale
    /// replacement is never empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0 && !matches!(self, Patch::Value(_))
    }

    /// Number of root-level entries.
    pub fn len(&self) -> usize {
        match self {
            Patch::Array(ops) => ops.len(),
            Patch::Map(entries) => entries.len(),
            Patch::HashMap32(entries) => entries.len(),
            Patch::HashMap64(entries) => entries.len(),
            Patch::Value(_) => 1,
        }
    }

    /// Kind of document node this patch applies to structurally, or the
    /// replacement's kind for `Value`.
    pub fn kind(&self) -> DocumentKind {
        match self {
            Patch::Array(_) => DocumentKind::Array,
            Patch::Map(_) => DocumentKind::Map,
            Patch::HashMap32(_) => DocumentKind::HashMap32,
            Patch::HashMap64(_) => DocumentKind::HashMap64,
            Patch::Value(v) => v.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("'{op}' entry without a '~INDEX~' field")]
    MissingIndex { op: &'static str },
    #[error("'~INDEX~' must be a non-negative integer, got {found}")]
    BadIndex { found: String },
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patches() {
        assert!(Patch::Array(vec![]).is_empty());
        assert!(Patch::Map(IndexMap::new()).is_empty());
        assert!(Patch::empty(DocumentKind::HashMap64).unwrap().is_empty());
        assert!(Patch::empty(DocumentKind::Int32).is_none());
    }

    #[test]
    fn wholesale_replacement_is_never_empty() {
        assert!(!Patch::Value(Document::Null).is_empty());
        assert!(!Patch::Value(Document::Array(vec![])).is_empty());
    }
}
