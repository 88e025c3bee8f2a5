// Changelog replay.

use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::change::{Change, ChangeKind, Value, ValueEntry};
use super::changelog::Changelog;
use super::save_data::write_save_data;
use super::table::{Shape, Table};
use super::{ChangelogError, META_DATA, record_hash, tables_of_mut};
use crate::document::{Document, Map};

/// Replay `changelog` onto `doc` and, when the document carries save-data
/// metadata, recompute the save-data layout.
///
/// Inconsistent records are repaired rather than rejected: an `Edit` of a
/// record that does not exist becomes an `Add`, an `Add` of an existing one
/// becomes an `Edit`. `Delete` records are skipped.
pub fn apply_changelog(mut doc: Document, changelog: &Changelog) -> Result<Document, ChangelogError> {
    let tables = tables_of_mut(&mut doc)?;
    let mut positions: HashMap<Table, HashMap<u64, usize>> = HashMap::new();

    for change in changelog {
        match change.kind {
            ChangeKind::Unknown => {
                return Err(ChangelogError::Format(format!(
                    "{} {:#x}: change of unknown kind",
                    change.table, change.hash
                )));
            }
            ChangeKind::None => continue,
            ChangeKind::Delete => {
                log::warn!(
                    "{} {:#x}: record deletion is not supported, skipping",
                    change.table,
                    change.hash
                );
                continue;
            }
            ChangeKind::Add | ChangeKind::Edit => {}
        }

        let slot = tables
            .entry(change.table.name().to_owned())
            .or_insert_with(|| Document::Array(Vec::new()));
        let kind = slot.kind();
        let records = slot.as_array_mut().ok_or_else(|| {
            ChangelogError::Format(format!("{} is {kind}, expected Array", change.table))
        })?;
        let index = match positions.entry(change.table) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(index_records(change.table, records)?),
        };
        write_change(change, records, index)?;
    }

    let has_meta = doc.as_map().is_some_and(|root| root.contains_key(META_DATA));
    if has_meta {
        write_save_data(&mut doc)?;
    }
    Ok(doc)
}

fn index_records(table: Table, records: &[Document]) -> Result<HashMap<u64, usize>, ChangelogError> {
    let mut index = HashMap::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        index.entry(record_hash(table, record)?).or_insert(position);
    }
    Ok(index)
}

fn write_change(
    change: &Change,
    records: &mut Vec<Document>,
    index: &mut HashMap<u64, usize>,
) -> Result<(), ChangelogError> {
    let position = index.get(&change.hash).copied();
    let change = match (position, change.kind) {
        (None, ChangeKind::Edit) => {
            log::warn!(
                "changelog inconsistency: edit of missing record {:#x} in {}, adding it",
                change.hash,
                change.table
            );
            let mut fixed = change.clone();
            fixed.retag(ChangeKind::Add);
            Cow::Owned(fixed)
        }
        (Some(_), ChangeKind::Add) => {
            log::warn!(
                "changelog inconsistency: add of existing record {:#x} in {}, editing it",
                change.hash,
                change.table
            );
            let mut fixed = change.clone();
            fixed.retag(ChangeKind::Edit);
            Cow::Owned(fixed)
        }
        _ => Cow::Borrowed(change),
    };

    match position {
        Some(position) => write_record(&change, &mut records[position]),
        None => {
            let mut record = Document::Map(Map::new());
            write_record(&change, &mut record)?;
            index.insert(change.hash, records.len());
            records.push(record);
            Ok(())
        }
    }
}

fn write_record(change: &Change, record: &mut Document) -> Result<(), ChangelogError> {
    let table = change.table;
    let kind = record.kind();
    let map = record.as_map_mut().ok_or_else(|| {
        ChangelogError::Format(format!("{table} {:#x}: record is {kind}", change.hash))
    })?;

    let hash = if table.has_wide_keys() {
        Document::UInt64(change.hash)
    } else {
        Document::UInt32(change.hash as u32)
    };
    map.insert("Hash".into(), hash);
    map.insert("ResetTypeValue".into(), Document::Int32(change.reset_type_value));
    map.insert("SaveFileIndex".into(), Document::Int32(change.save_file_index));
    if change.array_size != 0 {
        map.insert("ArraySize".into(), Document::UInt32(change.array_size));
    }
    if change.original_size != 0 {
        map.insert("OriginalSize".into(), Document::UInt32(change.original_size));
    }
    if change.extra_byte != 0 {
        map.insert("ExtraByte".into(), Document::Int32(change.extra_byte));
    }
    if change.size != 0 {
        map.insert("Size".into(), Document::UInt32(change.size));
    }

    let shape = table.shape();
    if shape == Shape::KeyOnly {
        return Ok(());
    }

    // Enum defaults keep the encoding the record already has; a new record
    // gets a single value when the change carries exactly one.
    let single_default = match shape {
        Shape::Scalar(_) | Shape::Vector(_) => true,
        Shape::Enum { .. } => match map.get("DefaultValue") {
            Some(existing) => existing.as_array().is_none(),
            None => change.default_value.len() == 1,
        },
        _ => false,
    };
    if single_default {
        if let Some(first) = change.default_value.first() {
            map.insert("DefaultValue".into(), to_document(change, &first.value)?);
        }
    } else {
        write_list(change, map, "DefaultValue", &change.default_value)?;
    }
    write_list(change, map, "Values", &change.values)?;

    if matches!(shape, Shape::Enum { .. }) || !change.raw_values.is_empty() {
        let raw = change.raw_values.iter().cloned().map(Document::String).collect();
        map.insert("RawValues".into(), Document::Array(raw));
    }
    Ok(())
}

/// Replay tagged entries positionally: `Add` appends, `Edit` replaces.
fn write_list(
    change: &Change,
    map: &mut Map,
    field: &str,
    entries: &[ValueEntry],
) -> Result<(), ChangelogError> {
    if entries.is_empty() {
        return Ok(());
    }
    let slot = map
        .entry(field.to_owned())
        .or_insert_with(|| Document::Array(Vec::new()));
    if change.kind == ChangeKind::Add || slot.as_array().is_none() {
        *slot = Document::Array(Vec::new());
    }
    let Document::Array(items) = slot else {
        return Err(ChangelogError::Format(format!("{field} is not an array")));
    };

    for entry in entries {
        let at = entry.index as usize;
        match entry.kind {
            ChangeKind::Add => items.push(to_document(change, &entry.value)?),
            ChangeKind::Edit if at < items.len() => items[at] = to_document(change, &entry.value)?,
            ChangeKind::Edit => {
                log::warn!(
                    "{} {:#x}: {field}[{at}] does not exist, appending instead",
                    change.table,
                    change.hash
                );
                items.push(to_document(change, &entry.value)?);
            }
            ChangeKind::None | ChangeKind::Unknown | ChangeKind::Delete => {}
        }
    }
    Ok(())
}

fn to_document(change: &Change, value: &Value) -> Result<Document, ChangelogError> {
    Ok(match value {
        Value::Bool(v) => Document::Bool(*v),
        Value::Int32(v) => Document::Int32(*v),
        Value::UInt32(v) => Document::UInt32(*v),
        Value::Int64(v) => Document::Int64(*v),
        Value::UInt64(v) => Document::UInt64(*v),
        Value::Float(v) => Document::Float32(*v),
        Value::String(v) => Document::String(v.clone()),
        Value::UInts(pair) => match pair.as_slice() {
            [hash, value] => [("Hash", *hash), ("Value", *value)].into_iter().collect(),
            _ => {
                return Err(ChangelogError::Format(format!(
                    "{} {:#x}: struct element has {} fields",
                    change.table,
                    change.hash,
                    pair.len()
                )));
            }
        },
        Value::Floats(axes) => match axes.as_slice() {
            [x, y] => [("x", *x), ("y", *y)].into_iter().collect(),
            [x, y, z] => [("x", *x), ("y", *y), ("z", *z)].into_iter().collect(),
            _ => {
                return Err(ChangelogError::Format(format!(
                    "{} {:#x}: vector has {} components",
                    change.table,
                    change.hash,
                    axes.len()
                )));
            }
        },
        Value::ULongs(terms) => Document::Array(terms.iter().copied().map(Document::UInt64).collect()),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdl::create_changelog;
    use pretty_assertions::assert_eq;

    fn record(hash: u32, default: Document) -> Document {
        [
            ("Hash", Document::UInt32(hash)),
            ("ResetTypeValue", Document::Int32(0)),
            ("SaveFileIndex", Document::Int32(0)),
            ("DefaultValue", default),
        ]
        .into_iter()
        .collect()
    }

    fn gdl(tables: Vec<(&str, Vec<Document>)>) -> Document {
        let data: Document = tables
            .into_iter()
            .map(|(name, records)| (name, Document::Array(records)))
            .collect();
        [("Data", data)].into_iter().collect()
    }

    fn strings(values: &[&str]) -> Document {
        Document::Array(values.iter().map(|v| Document::from(*v)).collect())
    }

    #[test]
    fn replays_adds_and_edits() {
        let reference = gdl(vec![
            ("String64Array", vec![record(1, strings(&["a", "b"]))]),
            ("Float", vec![record(2, Document::Float32(1.5))]),
        ]);
        let modified = gdl(vec![
            ("String64Array", vec![record(1, strings(&["a", "c", "d"]))]),
            (
                "Float",
                vec![
                    record(2, Document::Float32(2.5)),
                    record(3, Document::Float32(0.0)),
                ],
            ),
        ]);
        let log = create_changelog(&reference, &modified).unwrap();
        let applied = apply_changelog(reference, &log).unwrap();
        assert_eq!(applied, modified);
    }

    #[test]
    fn structured_values_round_trip() {
        let v2 = |x: f32, y: f32| -> Document { [("x", x), ("y", y)].into_iter().collect() };
        let pair = |h: u32, v: u32| -> Document { [("Hash", h), ("Value", v)].into_iter().collect() };
        let mut enum_rec = record(7, Document::UInt32(11));
        let map = enum_rec.as_map_mut().unwrap();
        map.insert(
            "Values".into(),
            Document::Array(vec![Document::UInt32(11), Document::UInt32(12)]),
        );
        map.insert("RawValues".into(), strings(&["On", "Off"]));
        let mut bool_exp: Document = [
            ("Hash", Document::UInt32(8)),
            ("ResetTypeValue", Document::Int32(0)),
            ("SaveFileIndex", Document::Int32(-1)),
        ]
        .into_iter()
        .collect();
        bool_exp.as_map_mut().unwrap().insert(
            "Values".into(),
            Document::Array(vec![Document::Array(vec![Document::UInt64(3)])]),
        );

        let reference = gdl(vec![("Bool", vec![])]);
        let modified = gdl(vec![
            ("Bool", vec![]),
            ("Vector2Array", vec![record(4, Document::Array(vec![v2(1.0, 2.0)]))]),
            ("Struct", vec![record(5, Document::Array(vec![pair(1, 2), pair(3, 4)]))]),
            ("Enum", vec![enum_rec]),
            ("BoolExp", vec![bool_exp]),
        ]);
        let log = create_changelog(&reference, &modified).unwrap();
        let log = Changelog::from_bytes(&log.to_bytes().unwrap()).unwrap();
        assert_eq!(apply_changelog(reference, &log).unwrap(), modified);
    }

    #[test]
    fn edit_of_missing_record_is_added() {
        let mut change = Change::new(Table::Int, 5);
        change.kind = ChangeKind::Edit;
        change.default_value = vec![ValueEntry {
            kind: ChangeKind::Edit,
            index: 0,
            value: Value::Int32(3),
        }];
        let base = gdl(vec![("Int", vec![])]);
        let out = apply_changelog(base, &Changelog::new(vec![change])).unwrap();
        let expected = gdl(vec![("Int", vec![record(5, Document::Int32(3))])]);
        assert_eq!(out, expected);
    }

    #[test]
    fn add_of_existing_record_edits_in_place() {
        let mut change = Change::new(Table::IntArray, 5);
        change.kind = ChangeKind::Add;
        change.default_value = vec![ValueEntry {
            kind: ChangeKind::Add,
            index: 0,
            value: Value::Int32(9),
        }];
        let base = gdl(vec![(
            "IntArray",
            vec![record(5, Document::Array(vec![Document::Int32(1), Document::Int32(2)]))],
        )]);
        let out = apply_changelog(base, &Changelog::new(vec![change])).unwrap();
        let expected = gdl(vec![(
            "IntArray",
            vec![record(5, Document::Array(vec![Document::Int32(9), Document::Int32(2)]))],
        )]);
        assert_eq!(out, expected);
    }

    #[test]
    fn missing_table_is_created() {
        let mut change = Change::new(Table::Bool64bitKey, u64::MAX);
        change.kind = ChangeKind::Add;
        let out = apply_changelog(gdl(vec![]), &Changelog::new(vec![change])).unwrap();
        let records = out.get("Data").and_then(|d| d.get("Bool64bitKey")).unwrap();
        assert_eq!(
            records.as_array().unwrap()[0].get("Hash"),
            Some(&Document::UInt64(u64::MAX))
        );
    }

    #[test]
    fn unknown_kind_is_rejected_and_delete_skipped() {
        let change = Change::new(Table::Int, 1);
        assert!(apply_changelog(gdl(vec![]), &Changelog::new(vec![change.clone()])).is_err());

        let mut delete = change;
        delete.kind = ChangeKind::Delete;
        let base = gdl(vec![("Int", vec![record(1, Document::Int32(0))])]);
        let out = apply_changelog(base.clone(), &Changelog::new(vec![delete])).unwrap();
        assert_eq!(out, base);
    }
}
