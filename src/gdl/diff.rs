// Changelog construction.

use std::collections::{HashMap, HashSet};

use super::change::{Change, ChangeKind, Value, ValueEntry, ValueType};
use super::changelog::Changelog;
use super::table::{Shape, Table};
use super::{ChangelogError, META_DATA, record_hash, tables_of};
use crate::document::Document;

/// Build the changelog that turns `reference` into `modified`.
///
/// Tables are visited in `reference` order, then the tables that only exist
/// in `modified`. Records keep the order of the modified table. Removing a
/// record is tolerated with a warning; shrinking a record's value list is
/// [`ChangelogError::Unsupported`].
pub fn create_changelog(
    reference: &Document,
    modified: &Document,
) -> Result<Changelog, ChangelogError> {
    let reference = tables_of(reference)?;
    let modified = tables_of(modified)?;
    let mut changes = Vec::new();

    for (name, records) in reference {
        if name == META_DATA {
            continue;
        }
        let table = Table::from_name(name)?;
        let vanilla = records_of(table, records)?;
        let edited = match modified.get(name) {
            Some(records) => records_of(table, records)?,
            None => &[],
        };
        diff_table(table, vanilla, edited, &mut changes)?;
    }
    for (name, records) in modified {
        if name == META_DATA || reference.contains_key(name) {
            continue;
        }
        let table = Table::from_name(name)?;
        diff_table(table, &[], records_of(table, records)?, &mut changes)?;
    }

    Ok(Changelog::new(changes))
}

/// Whether two record-table documents hold the same records. A difference
/// the changelog cannot express still counts as a difference.
pub fn compare(a: &Document, b: &Document) -> Result<bool, ChangelogError> {
    match create_changelog(a, b) {
        Ok(changelog) => Ok(changelog.is_empty()),
        Err(err) if err.is_unsupported() => {
            log::debug!("record tables differ: {err}");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn records_of(table: Table, records: &Document) -> Result<&[Document], ChangelogError> {
    records.as_array().map(Vec::as_slice).ok_or_else(|| {
        ChangelogError::Format(format!("{table} is {}, expected Array", records.kind()))
    })
}

fn diff_table(
    table: Table,
    vanilla: &[Document],
    modified: &[Document],
    changes: &mut Vec<Change>,
) -> Result<(), ChangelogError> {
    let mut by_hash = HashMap::with_capacity(vanilla.len());
    for record in vanilla {
        by_hash.entry(record_hash(table, record)?).or_insert(record);
    }

    let mut seen = HashSet::with_capacity(modified.len());
    for (position, record) in modified.iter().enumerate() {
        let hash = record_hash(table, record)?;
        seen.insert(hash);

        let change = match by_hash.get(&hash) {
            None => Change::from_record(table, record).map(|mut change| {
                change.retag(ChangeKind::Add);
                Some(change)
            }),
            Some(original) => Change::from_record(table, record).and_then(|change| {
                reconcile(change, &Change::from_record(table, original)?)
            }),
        };
        let change = change.inspect_err(|err| {
            log::error!("failed to build changelog entry for {table} {hash:#x}: {err}");
        })?;

        if let Some(mut change) = change {
            change.index = i32::try_from(position).map_err(|_| {
                ChangelogError::Format(format!("{table} holds too many records"))
            })?;
            changes.push(change);
        }
    }

    let removed = by_hash.keys().filter(|hash| !seen.contains(*hash)).count();
    if removed > 0 {
        log::warn!("{table}: {removed} vanilla records were removed; removal is not carried over");
    }
    Ok(())
}

/// Turn `modified` into an `Edit` against `vanilla`, or `None` if they match.
fn reconcile(mut modified: Change, vanilla: &Change) -> Result<Option<Change>, ChangelogError> {
    if modified.same_content(vanilla) {
        return Ok(None);
    }
    for (field, now, before) in [
        ("DefaultValue", &modified.default_value, &vanilla.default_value),
        ("Values", &modified.values, &vanilla.values),
    ] {
        if now.len() < before.len() {
            return Err(ChangelogError::Unsupported(format!(
                "{} {:#x}: {field} shrinks from {} to {} elements",
                modified.table,
                modified.hash,
                before.len(),
                now.len()
            )));
        }
    }

    modified.kind = ChangeKind::Edit;
    tag_elements(&mut modified.default_value, &vanilla.default_value);
    tag_elements(&mut modified.values, &vanilla.values);
    Ok(Some(modified))
}

fn tag_elements(modified: &mut [ValueEntry], vanilla: &[ValueEntry]) {
    for (i, entry) in modified.iter_mut().enumerate() {
        entry.kind = match vanilla.get(i) {
            None => ChangeKind::Add,
            Some(before) if before.value == entry.value => ChangeKind::None,
            Some(_) => ChangeKind::Edit,
        };
    }
}

// ---------------------------------------------------------------------------
// Record reading
// ---------------------------------------------------------------------------

impl Change {
    /// Read one record of `table` into an untagged change.
    pub fn from_record(table: Table, record: &Document) -> Result<Change, ChangelogError> {
        if record.as_map().is_none() {
            return Err(ChangelogError::Format(format!(
                "{table}: record is {}, expected Map",
                record.kind()
            )));
        }
        let mut change = Change::new(table, record_hash(table, record)?);

        let ctx = Ctx { table, hash: change.hash };
        if let Some(v) = ctx.meta(record, "ResetTypeValue", Document::as_i32)? {
            change.reset_type_value = v;
        }
        if let Some(v) = ctx.meta(record, "SaveFileIndex", Document::as_i32)? {
            change.save_file_index = v;
        }
        if let Some(v) = ctx.meta(record, "ExtraByte", Document::as_i32)? {
            change.extra_byte = v;
        }
        if let Some(v) = ctx.meta(record, "ArraySize", Document::as_u32)? {
            change.array_size = v;
        }
        if let Some(v) = ctx.meta(record, "OriginalSize", Document::as_u32)? {
            change.original_size = v;
        }
        if let Some(v) = ctx.meta(record, "Size", Document::as_u32)? {
            change.size = v;
        }

        let shape = table.shape();
        if shape != Shape::KeyOnly {
            if let Some(field) = record.get("DefaultValue") {
                change.default_value = ctx.default_value(shape, field)?;
            }
            if let Some(field) = record.get("Values") {
                change.values = ctx.list(shape, field, "Values")?;
            }
        }
        if let Some(field) = record.get("RawValues") {
            change.raw_values = ctx.raw_values(field)?;
        }
        Ok(change)
    }
}

/// Error context for one record.
struct Ctx {
    table: Table,
    hash: u64,
}

impl Ctx {
    fn format(&self, what: impl std::fmt::Display) -> ChangelogError {
        ChangelogError::Format(format!("{} {:#x}: {what}", self.table, self.hash))
    }

    fn meta<T>(
        &self,
        record: &Document,
        key: &str,
        read: fn(&Document) -> Option<T>,
    ) -> Result<Option<T>, ChangelogError> {
        record
            .get(key)
            .map(|node| read(node).ok_or_else(|| self.format(format_args!("bad {key} {node:?}"))))
            .transpose()
    }

    fn default_value(
        &self,
        shape: Shape,
        field: &Document,
    ) -> Result<Vec<ValueEntry>, ChangelogError> {
        let single = match shape {
            Shape::Scalar(_) | Shape::Vector(_) => true,
            Shape::Enum { .. } => field.as_array().is_none(),
            _ => false,
        };
        if single {
            Ok(vec![ValueEntry::new(0, self.element(shape, field)?)])
        } else {
            self.list(shape, field, "DefaultValue")
        }
    }

    fn list(
        &self,
        shape: Shape,
        field: &Document,
        name: &str,
    ) -> Result<Vec<ValueEntry>, ChangelogError> {
        let items = field
            .as_array()
            .ok_or_else(|| self.format(format_args!("{name} is {}, expected Array", field.kind())))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let index = u32::try_from(i).map_err(|_| self.format("value list too long"))?;
                Ok(ValueEntry::new(index, self.element(shape, item)?))
            })
            .collect()
    }

    fn element(&self, shape: Shape, node: &Document) -> Result<Value, ChangelogError> {
        match shape {
            Shape::Scalar(ty) | Shape::List(ty) => self.scalar(ty, node),
            Shape::Enum { .. } => match node {
                Document::UInt32(v) => Ok(Value::UInt32(*v)),
                Document::UInt64(v) => Ok(Value::UInt64(*v)),
                other => Err(self.format(format_args!("enum value is {}", other.kind()))),
            },
            Shape::Vector(n) | Shape::VectorList(n) => {
                let axes = &["x", "y", "z"][..n];
                let floats = axes
                    .iter()
                    .map(|axis| {
                        node.get(axis)
                            .and_then(Document::as_f32)
                            .ok_or_else(|| self.format(format_args!("vector without float {axis}")))
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Value::Floats(floats))
            }
            Shape::StructList => {
                let field = |key: &str| match node.get(key) {
                    Some(Document::UInt32(v)) => Ok(*v),
                    _ => Err(self.format(format_args!("struct element without uint32 {key}"))),
                };
                Ok(Value::UInts(vec![field("Hash")?, field("Value")?]))
            }
            Shape::BoolExp => {
                let terms = node
                    .as_array()
                    .ok_or_else(|| self.format(format_args!("expression is {}", node.kind())))?;
                let terms = terms
                    .iter()
                    .map(|term| match self.scalar(ValueType::UInt64, term)? {
                        Value::UInt64(v) => Ok(v),
                        _ => Err(self.format("expression term is not uint64")),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Value::ULongs(terms))
            }
            Shape::KeyOnly => Err(self.format("table carries no values")),
        }
    }

    /// Strict conversion; the only accepted widenings are int32 to int64 and
    /// uint32 to uint64.
    fn scalar(&self, ty: ValueType, node: &Document) -> Result<Value, ChangelogError> {
        let value = match (ty, node) {
            (ValueType::Boolean, Document::Bool(v)) => Value::Bool(*v),
            (ValueType::Int32, Document::Int32(v)) => Value::Int32(*v),
            (ValueType::UInt32, Document::UInt32(v)) => Value::UInt32(*v),
            (ValueType::Int64, Document::Int64(v)) => Value::Int64(*v),
            (ValueType::Int64, Document::Int32(v)) => Value::Int64(i64::from(*v)),
            (ValueType::UInt64, Document::UInt64(v)) => Value::UInt64(*v),
            (ValueType::UInt64, Document::UInt32(v)) => Value::UInt64(u64::from(*v)),
            (ValueType::Float, Document::Float32(v)) => Value::Float(*v),
            (ValueType::String, Document::String(v)) => Value::String(v.clone()),
            _ => {
                return Err(self.format(format_args!(
                    "expected {ty:?}, found {}",
                    node.kind()
                )));
            }
        };
        Ok(value)
    }

    fn raw_values(&self, field: &Document) -> Result<Vec<String>, ChangelogError> {
        let items = field
            .as_array()
            .ok_or_else(|| self.format(format_args!("RawValues is {}", field.kind())))?;
        let mut warned = false;
        items
            .iter()
            .map(|item| match item {
                Document::String(s) => Ok(s.clone()),
                // Written by a third-party editor that stored labels as numbers.
                Document::Int32(v) => {
                    if !warned {
                        log::warn!(
                            "{} {:#x}: RawValues holds Int32 labels instead of strings; converting",
                            self.table,
                            self.hash
                        );
                        warned = true;
                    }
                    Ok(format!("{v:02}"))
                }
                other => Err(self.format(format_args!(
                    "RawValues holds {} instead of String",
                    other.kind()
                ))),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
