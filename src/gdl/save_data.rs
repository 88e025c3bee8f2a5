// Save-data layout.
//
// The game sizes its save files from the record tables: a 0x20 header, an
// 8-byte descriptor per table (16 for `Bool64bitKey`), an 8-byte offset per
// record and a per-record payload. After records are added the four layout
// fields under `MetaData` no longer match and are recomputed here, once for
// the whole file and once per save slot.

use super::table::Table;
use super::{ChangelogError, META_DATA, tables_of};
use crate::document::{Document, Map};

/// Number of save slots described by `MetaData.SaveDirectory`.
pub const SAVE_SLOTS: usize = 7;

const HEADER: i64 = 0x20;
const TABLE_DESCRIPTOR: i64 = 8;
const RECORD_OFFSET: i64 = 8;

/// Computed layout of one save file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveLayout {
    pub size: i32,
    pub offset: i32,
}

/// Recompute `AllDataSaveOffset`, `AllDataSaveSize`, `SaveDataOffsetPos` and
/// `SaveDataSize`. Does nothing if the root has no `MetaData` map.
pub fn write_save_data(root: &mut Document) -> Result<(), ChangelogError> {
    let (all, slots) = {
        let Some(meta) = root.get(META_DATA).and_then(Document::as_map) else {
            return Ok(());
        };
        let tables = tables_of(root)?;
        let all = measure(tables, None)?;
        let mut slots = [SaveLayout::default(); SAVE_SLOTS];
        for (slot, layout) in slots.iter_mut().enumerate() {
            if slot_in_use(meta, slot) {
                *layout = measure(tables, Some(slot as i32))?;
            }
        }
        (all, slots)
    };

    let Some(meta) = root
        .as_map_mut()
        .and_then(|root| root.get_mut(META_DATA))
        .and_then(Document::as_map_mut)
    else {
        return Ok(());
    };
    meta.insert("AllDataSaveOffset".into(), Document::Int32(all.offset));
    meta.insert("AllDataSaveSize".into(), Document::Int32(all.size));
    meta.insert(
        "SaveDataOffsetPos".into(),
        Document::Array(slots.iter().map(|l| Document::Int32(l.offset)).collect()),
    );
    meta.insert(
        "SaveDataSize".into(),
        Document::Array(slots.iter().map(|l| Document::Int32(l.size)).collect()),
    );
    Ok(())
}

fn slot_in_use(meta: &Map, slot: usize) -> bool {
    meta.get("SaveDirectory")
        .and_then(Document::as_array)
        .and_then(|dirs| dirs.get(slot))
        .and_then(Document::as_str)
        .is_some_and(|dir| !dir.is_empty())
}

/// Layout over every record, or only the records of one save slot.
pub fn measure(tables: &Map, slot: Option<i32>) -> Result<SaveLayout, ChangelogError> {
    let mut size = HEADER;
    let mut offset = HEADER;

    for &table in Table::save_tables() {
        size += TABLE_DESCRIPTOR;
        offset += TABLE_DESCRIPTOR;
        if table.has_wide_keys() {
            size += TABLE_DESCRIPTOR;
            offset += TABLE_DESCRIPTOR;
        }

        let Some(records) = tables.get(table.name()) else {
            continue;
        };
        let records = records.as_array().ok_or_else(|| {
            ChangelogError::Format(format!("{table} is {}, expected Array", records.kind()))
        })?;

        let mut has_keys = false;
        for record in records {
            if let Some(slot) = slot {
                let index = record.get("SaveFileIndex").and_then(Document::as_i32);
                if index != Some(slot) {
                    continue;
                }
            }
            // Wide keys share one offset block per table.
            if table.has_wide_keys() {
                has_keys = true;
            } else {
                offset += RECORD_OFFSET;
            }
            size += record_size(table, record)?;
        }
        if has_keys {
            size += RECORD_OFFSET;
        }
    }

    let narrow = |v: i64| {
        i32::try_from(v).map_err(|_| ChangelogError::Format(format!("save data size {v} overflows")))
    };
    Ok(SaveLayout {
        size: narrow(size)?,
        offset: narrow(offset)?,
    })
}

/// Bytes one record occupies in a save file.
pub fn record_size(table: Table, record: &Document) -> Result<i64, ChangelogError> {
    let mut size = 8i64;
    let mut count = 1i64;

    if table.is_counted() {
        size += 4;
        count = if let Some(n) = record.get("ArraySize") {
            i64::from(uint(table, "ArraySize", n)?)
        } else if let Some(n) = record.get("Size") {
            i64::from(uint(table, "Size", n)?)
        } else if let Some(items) = record.get("DefaultValue").and_then(Document::as_array) {
            items.len() as i64
        } else {
            return Err(ChangelogError::Format(format!(
                "{table}: cannot determine array size of record"
            )));
        };
    }

    if table == Table::BoolArray {
        let bytes = ((count + 7) / 8).max(4);
        size += (bytes + 3) / 4 * 4;
    } else {
        size += count * table.element_size() as i64;
        if matches!(table, Table::Binary | Table::BinaryArray) {
            if let Some(n) = record.get("DefaultValue") {
                size += count * i64::from(uint(table, "DefaultValue", n)?);
            }
        }
    }
    Ok(size)
}

fn uint(table: Table, key: &str, node: &Document) -> Result<u32, ChangelogError> {
    node.as_u32()
        .ok_or_else(|| ChangelogError::Format(format!("{table}: bad {key} {node:?}")))
}
