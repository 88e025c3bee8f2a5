// Binary changelog stream.
//
// Layout (little-endian, strings are 7-bit length-prefixed UTF-8):
//
//   "GDLCL" | version u8 (= 1) | record count u16
//   record*:
//     kind u8 | table string | hash u64
//     Index i32 | ExtraByte i32 | ArraySize u32 | OriginalSize u32
//     SaveFileIndex i32 | ResetTypeValue i32 | Size u32
//     values | default values
//     raw count i32 | string*
//   values := count i32, (kind u8, type u8, index u32, payload)*
//   payload :=
//     Struct             count i32, u32*
//     Vector2/3[Array]   count i32, f32*
//     BoolExp            count i32, u64*
//     anything else      i32 0, scalar of the entry's type
//
// The record count sits at byte offset 6 and is written after the records.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::ChangelogError;
use super::change::{Change, ChangeKind, Value, ValueEntry, ValueType};
use super::table::Table;
use crate::wire;

pub const MAGIC: &[u8; 5] = b"GDLCL";
pub const VERSION: u8 = 1;
const COUNT_OFFSET: u64 = 6;

/// An ordered list of record changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changelog {
    pub changes: Vec<Change>,
}

impl Changelog {
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChangelogError> {
        let mut r = Cursor::new(bytes);
        let changelog = Self::read_from(&mut r)?;
        let rest = bytes.len() as u64 - r.position();
        if rest != 0 {
            log::debug!("ignoring {rest} bytes after the last changelog record");
        }
        Ok(changelog)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChangelogError> {
        let mut out = Cursor::new(Vec::new());
        self.write_to(&mut out)?;
        Ok(out.into_inner())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ChangelogError> {
        let mut magic = [0u8; 5];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ChangelogError::BadMagic);
        }
        let version = r.read_u8()?;
        if version != VERSION {
            return Err(ChangelogError::UnsupportedVersion(version));
        }
        let count = r.read_u16::<LittleEndian>()?;
        let changes = (0..count)
            .map(|_| read_change(r))
            .collect::<Result<_, _>>()?;
        Ok(Self { changes })
    }

    /// Write the header, every record, then seek back and fill in the count.
    pub fn write_to<W: Write + Seek>(&self, w: &mut W) -> Result<(), ChangelogError> {
        let count = u16::try_from(self.changes.len())
            .map_err(|_| ChangelogError::TooManyRecords(self.changes.len()))?;
        let start = w.stream_position()?;
        w.write_all(MAGIC)?;
        w.write_u8(VERSION)?;
        w.write_u16::<LittleEndian>(0)?;
        for change in &self.changes {
            write_change(w, change)?;
        }
        let end = w.stream_position()?;
        w.seek(SeekFrom::Start(start + COUNT_OFFSET))?;
        w.write_u16::<LittleEndian>(count)?;
        w.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Changelog {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

fn read_change<R: Read>(r: &mut R) -> Result<Change, ChangelogError> {
    let kind_byte = r.read_u8()?;
    let kind = ChangeKind::from_byte(kind_byte)
        .ok_or_else(|| ChangelogError::Format(format!("unknown change kind {kind_byte}")))?;
    let table = Table::from_name(&wire::read_string(r)?)?;
    let raw_hash = r.read_u64::<LittleEndian>()?;
    let hash = if table.has_wide_keys() {
        raw_hash
    } else {
        u64::from(raw_hash as u32)
    };

    let mut change = Change::new(table, hash);
    change.kind = kind;
    change.index = r.read_i32::<LittleEndian>()?;
    change.extra_byte = r.read_i32::<LittleEndian>()?;
    change.array_size = r.read_u32::<LittleEndian>()?;
    change.original_size = r.read_u32::<LittleEndian>()?;
    change.save_file_index = r.read_i32::<LittleEndian>()?;
    change.reset_type_value = r.read_i32::<LittleEndian>()?;
    change.size = r.read_u32::<LittleEndian>()?;
    change.values = read_values(r, table)?;
    change.default_value = read_values(r, table)?;

    let raw_count = read_count(r)?;
    change.raw_values = (0..raw_count)
        .map(|_| wire::read_string(r))
        .collect::<io::Result<_>>()?;
    Ok(change)
}

fn write_change<W: Write>(w: &mut W, change: &Change) -> Result<(), ChangelogError> {
    w.write_u8(change.kind as u8)?;
    wire::write_string(w, change.table.name())?;
    w.write_u64::<LittleEndian>(change.hash)?;
    w.write_i32::<LittleEndian>(change.index)?;
    w.write_i32::<LittleEndian>(change.extra_byte)?;
    w.write_u32::<LittleEndian>(change.array_size)?;
    w.write_u32::<LittleEndian>(change.original_size)?;
    w.write_i32::<LittleEndian>(change.save_file_index)?;
    w.write_i32::<LittleEndian>(change.reset_type_value)?;
    w.write_u32::<LittleEndian>(change.size)?;
    write_values(w, change.table, &change.values)?;
    write_values(w, change.table, &change.default_value)?;
    write_count(w, change.raw_values.len())?;
    for raw in &change.raw_values {
        wire::write_string(w, raw)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Value lists
// ---------------------------------------------------------------------------

/// Wire payload family, decided by the table.
#[derive(Clone, Copy)]
enum Payload {
    Scalar,
    UInts,
    Floats,
    ULongs,
}

fn payload_of(table: Table) -> Payload {
    match table {
        Table::Struct => Payload::UInts,
        Table::Vector2 | Table::Vector3 | Table::Vector2Array | Table::Vector3Array => {
            Payload::Floats
        }
        Table::BoolExp => Payload::ULongs,
        _ => Payload::Scalar,
    }
}

fn read_values<R: Read>(r: &mut R, table: Table) -> Result<Vec<ValueEntry>, ChangelogError> {
    let count = read_count(r)?;
    let payload = payload_of(table);
    let mut entries = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let kind_byte = r.read_u8()?;
        let kind = ChangeKind::from_byte(kind_byte).ok_or_else(|| {
            ChangelogError::Format(format!("unknown value change kind {kind_byte}"))
        })?;
        let type_byte = r.read_u8()?;
        let ty = ValueType::from_byte(type_byte)
            .ok_or_else(|| ChangelogError::Format(format!("unknown value type {type_byte}")))?;
        let index = r.read_u32::<LittleEndian>()?;
        let len = read_count(r)?;
        let value = match payload {
            Payload::UInts => Value::UInts(read_list(r, len, |r| r.read_u32::<LittleEndian>())?),
            Payload::Floats => Value::Floats(read_list(r, len, |r| r.read_f32::<LittleEndian>())?),
            Payload::ULongs => Value::ULongs(read_list(r, len, |r| r.read_u64::<LittleEndian>())?),
            Payload::Scalar if len == 0 => read_scalar(r, ty)?,
            Payload::Scalar => {
                return Err(ChangelogError::Format(format!(
                    "{table}: list payload of {len} elements where a scalar was expected"
                )));
            }
        };
        entries.push(ValueEntry { kind, index, value });
    }
    Ok(entries)
}

fn write_values<W: Write>(
    w: &mut W,
    table: Table,
    entries: &[ValueEntry],
) -> Result<(), ChangelogError> {
    write_count(w, entries.len())?;
    let payload = payload_of(table);
    for entry in entries {
        w.write_u8(entry.kind as u8)?;
        w.write_u8(entry.value.value_type() as u8)?;
        w.write_u32::<LittleEndian>(entry.index)?;
        match (payload, &entry.value) {
            (Payload::UInts, Value::UInts(items)) => {
                write_count(w, items.len())?;
                for v in items {
                    w.write_u32::<LittleEndian>(*v)?;
                }
            }
            (Payload::Floats, Value::Floats(items)) => {
                write_count(w, items.len())?;
                for v in items {
                    w.write_f32::<LittleEndian>(*v)?;
                }
            }
            (Payload::ULongs, Value::ULongs(items)) => {
                write_count(w, items.len())?;
                for v in items {
                    w.write_u64::<LittleEndian>(*v)?;
                }
            }
            (Payload::Scalar, value) => {
                w.write_i32::<LittleEndian>(0)?;
                write_scalar(w, table, value)?;
            }
            (_, value) => {
                return Err(ChangelogError::Format(format!(
                    "{table}: cannot encode {:?} value",
                    value.value_type()
                )));
            }
        }
    }
    Ok(())
}

fn read_scalar<R: Read>(r: &mut R, ty: ValueType) -> Result<Value, ChangelogError> {
    Ok(match ty {
        ValueType::Boolean => Value::Bool(r.read_u8()? != 0),
        ValueType::Int32 => Value::Int32(r.read_i32::<LittleEndian>()?),
        ValueType::UInt32 => Value::UInt32(r.read_u32::<LittleEndian>()?),
        ValueType::Int64 => Value::Int64(r.read_i64::<LittleEndian>()?),
        ValueType::UInt64 => Value::UInt64(r.read_u64::<LittleEndian>()?),
        ValueType::Float => Value::Float(r.read_f32::<LittleEndian>()?),
        ValueType::String => Value::String(wire::read_string(r)?),
        ValueType::Unknown => {
            return Err(ChangelogError::Format("value of unknown type".into()));
        }
    })
}

fn write_scalar<W: Write>(w: &mut W, table: Table, value: &Value) -> Result<(), ChangelogError> {
    match value {
        Value::Bool(v) => w.write_u8(u8::from(*v))?,
        Value::Int32(v) => w.write_i32::<LittleEndian>(*v)?,
        Value::UInt32(v) => w.write_u32::<LittleEndian>(*v)?,
        Value::Int64(v) => w.write_i64::<LittleEndian>(*v)?,
        Value::UInt64(v) => w.write_u64::<LittleEndian>(*v)?,
        Value::Float(v) => w.write_f32::<LittleEndian>(*v)?,
        Value::String(v) => wire::write_string(w, v)?,
        Value::UInts(_) | Value::ULongs(_) | Value::Floats(_) => {
            return Err(ChangelogError::Format(format!(
                "{table}: list value where a scalar was expected"
            )));
        }
    }
    Ok(())
}

fn read_list<R: Read, T>(
    r: &mut R,
    len: usize,
    mut read_one: impl FnMut(&mut R) -> io::Result<T>,
) -> io::Result<Vec<T>> {
    let mut out = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        out.push(read_one(r)?);
    }
    Ok(out)
}

fn read_count<R: Read>(r: &mut R) -> Result<usize, ChangelogError> {
    let n = r.read_i32::<LittleEndian>()?;
    usize::try_from(n).map_err(|_| ChangelogError::Format(format!("negative length {n}")))
}

fn write_count<W: Write>(w: &mut W, len: usize) -> Result<(), ChangelogError> {
    let n = i32::try_from(len)
        .map_err(|_| ChangelogError::Format(format!("list of {len} elements is too long")))?;
    w.write_i32::<LittleEndian>(n)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
