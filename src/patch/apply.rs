// Patch replay: Apply(base, patch) -> Document.

use std::collections::BTreeMap;
use std::hash::Hash;
use std::mem;

use indexmap::IndexMap;

use super::{ArrayOp, EntryOp, Patch};
use crate::document::Document;

/// Apply `patch` to a copy of `base`.
pub fn apply(base: &Document, patch: &Patch) -> Document {
    apply_owned(base.clone(), patch)
}

/// Apply `patch` to `base`, consuming it.
///
/// A container patch merges into a base node of the same container kind;
/// every other combination replaces the node with the patch's wire value.
/// This holds for map entries too: an entry whose base kind differs from
/// the patch is overwritten, not left alone, so `apply(r, diff(r, m)) == m`
/// holds even when a mod changes a value's type. Tools that skip such
/// entries will merge the same patch differently.
pub fn apply_owned(base: Document, patch: &Patch) -> Document {
    match (base, patch) {
        (Document::Array(items), Patch::Array(ops)) => Document::Array(apply_array(items, ops)),
        (Document::Map(mut map), Patch::Map(entries)) => {
            apply_entries(&mut map, entries.iter());
            Document::Map(map)
        }
        (Document::HashMap32(mut map), Patch::HashMap32(entries)) => {
            apply_entries(&mut map, entries.iter());
            Document::HashMap32(map)
        }
        (Document::HashMap64(mut map), Patch::HashMap64(entries)) => {
            apply_entries(&mut map, entries.iter());
            Document::HashMap64(map)
        }
        (_, patch) => patch.to_document(),
    }
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

struct Slot {
    value: Document,
    doomed: bool,
}

impl Slot {
    fn live(value: Document) -> Self {
        Self {
            value,
            doomed: false,
        }
    }
}

/// Additions, prepends and modifications take effect immediately in patch
/// order. Deletions only mark the element currently at their index and are
/// swept after the pass, so they never shift a later `~INDEX~`.
fn apply_array(items: Vec<Document>, ops: &[ArrayOp]) -> Vec<Document> {
    let mut slots: Vec<Slot> = items.into_iter().map(Slot::live).collect();

    for op in ops {
        match op {
            ArrayOp::Add(value) => slots.push(Slot::live(value.clone())),
            ArrayOp::Insert(value) => slots.insert(0, Slot::live(value.clone())),
            ArrayOp::Modify { index, payload } => match slots.get_mut(*index) {
                Some(slot) => {
                    let current = mem::take(&mut slot.value);
                    slot.value = apply_owned(current, payload);
                }
                None => {
                    log::debug!(
                        "modify at index {index} past array end ({}), appending",
                        slots.len()
                    );
                    slots.push(Slot::live(payload.to_document()));
                }
            },
            ArrayOp::Delete { index, .. } => match slots.get_mut(*index) {
                Some(slot) => slot.doomed = true,
                None => log::warn!(
                    "delete at index {index} past array end ({}), ignoring",
                    slots.len()
                ),
            },
            ArrayOp::Literal(_) => {}
        }
    }

    slots
        .into_iter()
        .filter(|slot| !slot.doomed)
        .map(|slot| slot.value)
        .collect()
}

// ---------------------------------------------------------------------------
// Keyed containers
// ---------------------------------------------------------------------------

trait Entries<K> {
    fn entry_mut(&mut self, key: &K) -> Option<&mut Document>;
    fn remove_entry(&mut self, key: &K);
    fn insert_entry(&mut self, key: K, value: Document);
}

impl<K: Hash + Eq> Entries<K> for IndexMap<K, Document> {
    fn entry_mut(&mut self, key: &K) -> Option<&mut Document> {
        self.get_mut(key)
    }

    fn remove_entry(&mut self, key: &K) {
        // Keep the remaining keys in their original order.
        self.shift_remove(key);
    }

    fn insert_entry(&mut self, key: K, value: Document) {
        self.insert(key, value);
    }
}

impl<K: Ord> Entries<K> for BTreeMap<K, Document> {
    fn entry_mut(&mut self, key: &K) -> Option<&mut Document> {
        self.get_mut(key)
    }

    fn remove_entry(&mut self, key: &K) {
        self.remove(key);
    }

    fn insert_entry(&mut self, key: K, value: Document) {
        self.insert(key, value);
    }
}

fn apply_entries<'a, K, C>(base: &mut C, entries: impl Iterator<Item = (&'a K, &'a EntryOp)>)
where
    K: Clone + 'a,
    C: Entries<K>,
{
    for (key, op) in entries {
        match op {
            EntryOp::Delete => base.remove_entry(key),
            EntryOp::Set(patch) => match base.entry_mut(key) {
                Some(existing) => {
                    let current = mem::take(existing);
                    *existing = apply_owned(current, patch);
                }
                None => base.insert_entry(key.clone(), patch.to_document()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
