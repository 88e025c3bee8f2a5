// Sentinel wire encoding of a `Patch`.
//
// Arrays carry one map per operation:
//
//   {"~ADD~": value}
//   {"~INSERT~": value}
//   {"~MOD~": payload, "~INDEX~": i}
//   {"~DEL~": stale value, "~INDEX~": i}
//
// Keyed containers carry the literal string "~DEL~" for a removed key and
// the (possibly nested) patch otherwise. Anything else is a plain value.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use super::{ADD, ArrayOp, DEL, EntryOp, INDEX, INSERT, MOD, Patch, PatchError};
use crate::document::{Document, HashMap32, HashMap64, Map};

impl Patch {
    /// Encode as a wire document.
    pub fn to_document(&self) -> Document {
        match self {
            Patch::Value(v) => v.clone(),
            Patch::Array(ops) => Document::Array(ops.iter().map(ArrayOp::to_document).collect()),
            Patch::Map(entries) => Document::Map(
                entries
                    .iter()
                    .map(|(k, op)| (k.clone(), op.to_document()))
                    .collect::<Map>(),
            ),
            Patch::HashMap32(entries) => Document::HashMap32(
                entries
                    .iter()
                    .map(|(k, op)| (*k, op.to_document()))
                    .collect::<HashMap32>(),
            ),
            Patch::HashMap64(entries) => Document::HashMap64(
                entries
                    .iter()
                    .map(|(k, op)| (*k, op.to_document()))
                    .collect::<HashMap64>(),
            ),
        }
    }

    /// Decode a wire document.
    pub fn from_document(doc: &Document) -> Result<Patch, PatchError> {
        let patch = match doc {
            Document::Array(items) => Patch::Array(
                items
                    .iter()
                    .map(ArrayOp::from_document)
                    .collect::<Result<_, _>>()?,
            ),
            Document::Map(map) => Patch::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), EntryOp::from_document(v)?)))
                    .collect::<Result<IndexMap<_, _>, PatchError>>()?,
            ),
            Document::HashMap32(map) => Patch::HashMap32(
                map.iter()
                    .map(|(k, v)| Ok((*k, EntryOp::from_document(v)?)))
                    .collect::<Result<BTreeMap<_, _>, PatchError>>()?,
            ),
            Document::HashMap64(map) => Patch::HashMap64(
                map.iter()
                    .map(|(k, v)| Ok((*k, EntryOp::from_document(v)?)))
                    .collect::<Result<BTreeMap<_, _>, PatchError>>()?,
            ),
            other => Patch::Value(other.clone()),
        };
        Ok(patch)
    }
}

impl EntryOp {
    fn to_document(&self) -> Document {
        match self {
            EntryOp::Delete => Document::String(DEL.to_owned()),
            EntryOp::Set(patch) => patch.to_document(),
        }
    }

    fn from_document(doc: &Document) -> Result<EntryOp, PatchError> {
        if doc.as_str() == Some(DEL) {
            return Ok(EntryOp::Delete);
        }
        Ok(EntryOp::Set(Patch::from_document(doc)?))
    }
}

impl ArrayOp {
    fn to_document(&self) -> Document {
        let mut entry = Map::new();
        match self {
            ArrayOp::Literal(v) => return v.clone(),
            ArrayOp::Add(v) => {
                entry.insert(ADD.to_owned(), v.clone());
            }
            ArrayOp::Insert(v) => {
                entry.insert(INSERT.to_owned(), v.clone());
            }
            ArrayOp::Modify { index, payload } => {
                entry.insert(MOD.to_owned(), payload.to_document());
                entry.insert(INDEX.to_owned(), index_node(*index));
            }
            ArrayOp::Delete { index, stale } => {
                entry.insert(DEL.to_owned(), stale.clone());
                entry.insert(INDEX.to_owned(), index_node(*index));
            }
        }
        Document::Map(entry)
    }

    fn from_document(doc: &Document) -> Result<ArrayOp, PatchError> {
        let Some(map) = doc.as_map() else {
            return Ok(ArrayOp::Literal(doc.clone()));
        };
        if let Some(payload) = map.get(MOD) {
            return Ok(ArrayOp::Modify {
                index: read_index(map, MOD)?,
                payload: Patch::from_document(payload)?,
            });
        }
        if let Some(stale) = map.get(DEL) {
            return Ok(ArrayOp::Delete {
                index: read_index(map, DEL)?,
                stale: stale.clone(),
            });
        }
        if let Some(v) = map.get(ADD) {
            return Ok(ArrayOp::Add(v.clone()));
        }
        if let Some(v) = map.get(INSERT) {
            return Ok(ArrayOp::Insert(v.clone()));
        }
        Ok(ArrayOp::Literal(doc.clone()))
    }
}

/// Indices are written as int32 and read back from any integer kind.
fn index_node(index: usize) -> Document {
    match i32::try_from(index) {
        Ok(i) => Document::Int32(i),
        Err(_) => Document::UInt64(index as u64),
    }
}

fn read_index(map: &Map, op: &'static str) -> Result<usize, PatchError> {
    let node = map.get(INDEX).ok_or(PatchError::MissingIndex { op })?;
    node.as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| PatchError::BadIndex {
            found: format!("{node:?}"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
