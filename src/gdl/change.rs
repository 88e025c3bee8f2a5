// Changelog records.

use super::table::Table;

/// Operation carried by a record or by one of its value entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChangeKind {
    Unknown = 0,
    Add = 1,
    Edit = 2,
    Delete = 3,
    None = 4,
}

impl ChangeKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0 => Self::Unknown,
            1 => Self::Add,
            2 => Self::Edit,
            3 => Self::Delete,
            4 => Self::None,
            _ => return None,
        })
    }
}

/// Scalar type tag of a value entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Unknown = 0,
    String = 1,
    Boolean = 2,
    Int32 = 3,
    UInt32 = 4,
    Int64 = 5,
    UInt64 = 6,
    Float = 7,
}

impl ValueType {
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0 => Self::Unknown,
            1 => Self::String,
            2 => Self::Boolean,
            3 => Self::Int32,
            4 => Self::UInt32,
            5 => Self::Int64,
            6 => Self::UInt64,
            7 => Self::Float,
            _ => return None,
        })
    }
}

/// Typed payload of a value entry.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    String(String),
    /// `Struct` pair `[Hash, Value]`.
    UInts(Vec<u32>),
    /// `BoolExp` term list.
    ULongs(Vec<u64>),
    /// `Vector2` / `Vector3` components.
    Floats(Vec<f32>),
}

impl Value {
    /// Type tag written next to this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Boolean,
            Value::Int32(_) => ValueType::Int32,
            Value::UInt32(_) | Value::UInts(_) => ValueType::UInt32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt64(_) | Value::ULongs(_) => ValueType::UInt64,
            Value::Float(_) | Value::Floats(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::UInts(a), Value::UInts(b)) => a == b,
            (Value::ULongs(a), Value::ULongs(b)) => a == b,
            (Value::Floats(a), Value::Floats(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

/// One element of a record's `Values` or `DefaultValue` list.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntry {
    pub kind: ChangeKind,
    pub index: u32,
    pub value: Value,
}

impl ValueEntry {
    pub fn new(index: u32, value: Value) -> Self {
        Self {
            kind: ChangeKind::Unknown,
            index,
            value,
        }
    }
}

/// One record of a changelog.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub table: Table,
    /// Record identity. Narrowed to 32 bits except for wide-key tables.
    pub hash: u64,
    /// Position of the record in the modified table.
    pub index: i32,
    pub extra_byte: i32,
    pub array_size: u32,
    pub original_size: u32,
    pub save_file_index: i32,
    pub reset_type_value: i32,
    pub size: u32,
    pub values: Vec<ValueEntry>,
    pub default_value: Vec<ValueEntry>,
    pub raw_values: Vec<String>,
}

impl Change {
    pub fn new(table: Table, hash: u64) -> Self {
        Self {
            kind: ChangeKind::Unknown,
            table,
            hash,
            index: 0,
            extra_byte: 0,
            array_size: 0,
            original_size: 0,
            save_file_index: 0,
            reset_type_value: 0,
            size: 0,
            values: Vec::new(),
            default_value: Vec::new(),
            raw_values: Vec::new(),
        }
    }

    /// Same record content: metadata, raw values and every value element.
    /// Change kinds and the table position are ignored.
    pub fn same_content(&self, other: &Change) -> bool {
        fn same_values(a: &[ValueEntry], b: &[ValueEntry]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.value == y.value)
        }

        self.table == other.table
            && self.hash == other.hash
            && self.extra_byte == other.extra_byte
            && self.array_size == other.array_size
            && self.original_size == other.original_size
            && self.size == other.size
            && self.save_file_index == other.save_file_index
            && self.reset_type_value == other.reset_type_value
            && self.raw_values == other.raw_values
            && same_values(&self.values, &other.values)
            && same_values(&self.default_value, &other.default_value)
    }

    /// Tag the record and every value entry with `kind`.
    pub fn retag(&mut self, kind: ChangeKind) {
        self.kind = kind;
        for entry in self.values.iter_mut().chain(self.default_value.iter_mut()) {
            entry.kind = kind;
        }
    }
}
