// Structural diff: Diff(reference, modified) -> Patch.

use super::{ArrayOp, EntryOp, Patch};
use crate::document::Document;

/// Compute the patch that turns `reference` into `modified`.
///
/// Nodes of the same container kind are diffed entry by entry; any other
/// pairing yields `Patch::Value(modified)`.
pub fn diff(reference: &Document, modified: &Document) -> Patch {
    match (reference, modified) {
        (Document::Array(r), Document::Array(m)) => Patch::Array(diff_array(r, m)),
        (Document::Map(r), Document::Map(m)) => Patch::Map(diff_entries(
            r.iter(),
            m.iter(),
            |k| r.get(k),
            |k| m.contains_key(k),
        )),
        (Document::HashMap32(r), Document::HashMap32(m)) => {
            Patch::HashMap32(diff_entries(
                r.iter(),
                m.iter(),
                |k| r.get(k),
                |k| m.contains_key(k),
            ))
        }
        (Document::HashMap64(r), Document::HashMap64(m)) => {
            Patch::HashMap64(diff_entries(
                r.iter(),
                m.iter(),
                |k| r.get(k),
                |k| m.contains_key(k),
            ))
        }
        _ => Patch::Value(modified.clone()),
    }
}

fn diff_array(reference: &[Document], modified: &[Document]) -> Vec<ArrayOp> {
    let mut ops = Vec::new();
    let shared = reference.len().min(modified.len());

    for (index, (r, m)) in reference.iter().zip(modified).enumerate() {
        if r == m {
            continue;
        }
        ops.push(ArrayOp::Modify {
            index,
            payload: diff(r, m),
        });
    }
    ops.extend(modified[shared..].iter().cloned().map(ArrayOp::Add));
    ops.extend(
        reference[shared..]
            .iter()
            .enumerate()
            .map(|(offset, stale)| ArrayOp::Delete {
                index: shared + offset,
                stale: stale.clone(),
            }),
    );
    ops
}

/// Keyed-container diff shared by maps and both hash-map kinds.
///
/// Deletions come first (reference order), then additions and changes
/// (modified order). Equal values are omitted.
fn diff_entries<'a, K, C>(
    reference: impl Iterator<Item = (&'a K, &'a Document)>,
    modified: impl Iterator<Item = (&'a K, &'a Document)>,
    lookup_reference: impl Fn(&K) -> Option<&'a Document>,
    in_modified: impl Fn(&K) -> bool,
) -> C
where
    K: Clone + 'a,
    C: FromIterator<(K, EntryOp)>,
{
    let deleted = reference
        .filter(|(k, _)| !in_modified(k))
        .map(|(k, _)| (k.clone(), EntryOp::Delete));

    let changed = modified.filter_map(|(k, m)| match lookup_reference(k) {
        None => Some((k.clone(), EntryOp::Set(Patch::Value(m.clone())))),
        Some(r) if r == m => None,
        Some(r) => Some((k.clone(), EntryOp::Set(diff(r, m)))),
    });

    deleted.chain(changed).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{HashMap32, Map};

    fn ints(values: &[i32]) -> Document {
        Document::Array(values.iter().copied().map(Document::Int32).collect())
    }

    #[test]
    fn identical_documents_diff_to_empty() {
        let doc: Document = [("a", ints(&[1, 2])), ("b", Document::from("x"))]
            .into_iter()
            .collect();
        assert!(diff(&doc, &doc).is_empty());
    }

    #[test]
    fn array_growth_emits_adds_in_order() {
        let Patch::Array(ops) = diff(&ints(&[1]), &ints(&[1, 2, 3])) else {
            panic!("expected array patch");
        };
        assert_eq!(
            ops,
            vec![
                ArrayOp::Add(Document::Int32(2)),
                ArrayOp::Add(Document::Int32(3))
            ]
        );
    }

    #[test]
    fn array_shrink_emits_deletes_with_stale_values() {
        let Patch::Array(ops) = diff(&ints(&[1, 2, 3]), &ints(&[1])) else {
            panic!("expected array patch");
        };
        assert_eq!(
            ops,
            vec![
                ArrayOp::Delete {
                    index: 1,
                    stale: Document::Int32(2)
                },
                ArrayOp::Delete {
                    index: 2,
                    stale: Document::Int32(3)
                },
            ]
        );
    }

    #[test]
    fn nested_container_changes_recurse() {
        let r = Document::Array(vec![ints(&[1, 2])]);
        let m = Document::Array(vec![ints(&[1, 5])]);
        let Patch::Array(ops) = diff(&r, &m) else {
            panic!("expected array patch");
        };
        assert_eq!(
            ops,
            vec![ArrayOp::Modify {
                index: 0,
                payload: Patch::Array(vec![ArrayOp::Modify {
                    index: 1,
                    payload: Patch::Value(Document::Int32(5)),
                }]),
            }]
        );
    }

    #[test]
    fn scalar_to_container_change_is_wholesale() {
        let r = Document::Array(vec![Document::Int32(1)]);
        let m = Document::Array(vec![ints(&[1])]);
        let Patch::Array(ops) = diff(&r, &m) else {
            panic!("expected array patch");
        };
        assert_eq!(
            ops,
            vec![ArrayOp::Modify {
                index: 0,
                payload: Patch::Value(ints(&[1])),
            }]
        );
    }

    #[test]
    fn map_diff_classifies_keys() {
        let r: Document = [("keep", 1i32), ("gone", 2), ("edit", 3)]
            .into_iter()
            .collect();
        let m: Document = [("keep", 1i32), ("edit", 4), ("new", 5)]
            .into_iter()
            .collect();
        let Patch::Map(entries) = diff(&r, &m) else {
            panic!("expected map patch");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries["gone"], EntryOp::Delete);
        assert_eq!(
            entries["edit"],
            EntryOp::Set(Patch::Value(Document::Int32(4)))
        );
        assert_eq!(
            entries["new"],
            EntryOp::Set(Patch::Value(Document::Int32(5)))
        );
        assert!(!entries.contains_key("keep"));
    }

    #[test]
    fn hash_map_diff() {
        let mut r = HashMap32::new();
        r.insert(1, Document::Bool(true));
        r.insert(2, Document::Bool(false));
        let mut m = r.clone();
        m.remove(&1);
        m.insert(3, Document::Null);
        let Patch::HashMap32(entries) = diff(&Document::HashMap32(r), &Document::HashMap32(m))
        else {
            panic!("expected hashmap32 patch");
        };
        assert_eq!(entries[&1], EntryOp::Delete);
        assert_eq!(entries[&3], EntryOp::Set(Patch::Value(Document::Null)));
        assert!(!entries.contains_key(&2));
    }

    #[test]
    fn root_kind_mismatch_takes_modified() {
        let m = Document::Map(Map::new());
        assert_eq!(diff(&ints(&[1]), &m), Patch::Value(m.clone()));
    }
}
