// Record-table names and their value shapes.
//
// Which fields a record carries and how their values are typed is decided by
// the table alone. `Table::shape` is the single source of that mapping for
// both the changelog builder and the changelog replay.

use std::fmt;

use super::ChangelogError;
use super::change::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Bool,
    BoolArray,
    Int,
    IntArray,
    Float,
    FloatArray,
    Enum,
    EnumArray,
    Vector2,
    Vector2Array,
    Vector3,
    Vector3Array,
    String16,
    String16Array,
    String32,
    String32Array,
    String64,
    String64Array,
    Binary,
    BinaryArray,
    UInt,
    UIntArray,
    Int64,
    Int64Array,
    UInt64,
    UInt64Array,
    WString16,
    WString16Array,
    WString32,
    WString32Array,
    WString64,
    WString64Array,
    Bool64bitKey,
    BoolExp,
    Struct,
}

/// How a table's `DefaultValue` / `Values` fields are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Only the key and metadata; no value fields.
    KeyOnly,
    /// `DefaultValue` is one scalar.
    Scalar(ValueType),
    /// `DefaultValue` is a list of scalars.
    List(ValueType),
    /// `DefaultValue` is an `{x, y[, z]}` float map.
    Vector(usize),
    /// `DefaultValue` is a list of `{x, y[, z]}` maps.
    VectorList(usize),
    /// `DefaultValue` is a list of `{Hash, Value}` uint32 pairs.
    StructList,
    /// `Values` is a list of uint64 lists.
    BoolExp,
    /// `DefaultValue` is a uint32/uint64 scalar (or a list when
    /// `list_default`), `Values` a list of the same, plus `RawValues`.
    Enum { list_default: bool },
}

impl Table {
    /// Every table, in save-data layout order for the first 33.
    pub const ALL: [Table; 35] = [
        Table::Bool,
        Table::BoolArray,
        Table::Int,
        Table::IntArray,
        Table::Float,
        Table::FloatArray,
        Table::Enum,
        Table::EnumArray,
        Table::Vector2,
        Table::Vector2Array,
        Table::Vector3,
        Table::Vector3Array,
        Table::String16,
        Table::String16Array,
        Table::String32,
        Table::String32Array,
        Table::String64,
        Table::String64Array,
        Table::Binary,
        Table::BinaryArray,
        Table::UInt,
        Table::UIntArray,
        Table::Int64,
        Table::Int64Array,
        Table::UInt64,
        Table::UInt64Array,
        Table::WString16,
        Table::WString16Array,
        Table::WString32,
        Table::WString32Array,
        Table::WString64,
        Table::WString64Array,
        Table::Bool64bitKey,
        Table::BoolExp,
        Table::Struct,
    ];

    /// Tables that contribute to the save-data layout, in layout order.
    pub fn save_tables() -> &'static [Table] {
        &Self::ALL[..33]
    }

    pub fn from_name(name: &str) -> Result<Table, ChangelogError> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| ChangelogError::UnknownTable(name.to_owned()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Table::Bool => "Bool",
            Table::BoolArray => "BoolArray",
            Table::Int => "Int",
            Table::IntArray => "IntArray",
            Table::Float => "Float",
            Table::FloatArray => "FloatArray",
            Table::Enum => "Enum",
            Table::EnumArray => "EnumArray",
            Table::Vector2 => "Vector2",
            Table::Vector2Array => "Vector2Array",
            Table::Vector3 => "Vector3",
            Table::Vector3Array => "Vector3Array",
            Table::String16 => "String16",
            Table::String16Array => "String16Array",
            Table::String32 => "String32",
            Table::String32Array => "String32Array",
            Table::String64 => "String64",
            Table::String64Array => "String64Array",
            Table::Binary => "Binary",
            Table::BinaryArray => "BinaryArray",
            Table::UInt => "UInt",
            Table::UIntArray => "UIntArray",
            Table::Int64 => "Int64",
            Table::Int64Array => "Int64Array",
            Table::UInt64 => "UInt64",
            Table::UInt64Array => "UInt64Array",
            Table::WString16 => "WString16",
            Table::WString16Array => "WString16Array",
            Table::WString32 => "WString32",
            Table::WString32Array => "WString32Array",
            Table::WString64 => "WString64",
            Table::WString64Array => "WString64Array",
            Table::Bool64bitKey => "Bool64bitKey",
            Table::BoolExp => "BoolExp",
            Table::Struct => "Struct",
        }
    }

    /// Record keys are uint64 rather than uint32.
    pub fn has_wide_keys(self) -> bool {
        self == Table::Bool64bitKey
    }

    pub fn shape(self) -> Shape {
        use ValueType as V;
        match self {
            Table::Bool => Shape::Scalar(V::Boolean),
            Table::BoolArray => Shape::List(V::Boolean),
            Table::Int => Shape::Scalar(V::Int32),
            Table::IntArray => Shape::List(V::Int32),
            Table::Float => Shape::Scalar(V::Float),
            Table::FloatArray => Shape::List(V::Float),
            Table::Enum => Shape::Enum {
                list_default: false,
            },
            Table::EnumArray => Shape::Enum { list_default: true },
            Table::Vector2 => Shape::Vector(2),
            Table::Vector2Array => Shape::VectorList(2),
            Table::Vector3 => Shape::Vector(3),
            Table::Vector3Array => Shape::VectorList(3),
            Table::String16
            | Table::String32
            | Table::String64
            | Table::WString16
            | Table::WString32
            | Table::WString64 => Shape::Scalar(V::String),
            Table::String16Array
            | Table::String32Array
            | Table::String64Array
            | Table::WString16Array
            | Table::WString32Array
            | Table::WString64Array => Shape::List(V::String),
            // A binary blob's DefaultValue is its byte size, array or not.
            Table::Binary | Table::BinaryArray => Shape::Scalar(V::UInt32),
            Table::UInt => Shape::Scalar(V::UInt32),
            Table::UIntArray => Shape::List(V::UInt32),
            Table::Int64 => Shape::Scalar(V::Int64),
            Table::Int64Array => Shape::List(V::Int64),
            Table::UInt64 => Shape::Scalar(V::UInt64),
            Table::UInt64Array => Shape::List(V::UInt64),
            Table::Bool64bitKey => Shape::KeyOnly,
            Table::BoolExp => Shape::BoolExp,
            Table::Struct => Shape::StructList,
        }
    }

    /// Per-element save-data footprint in bytes, for the tables that store
    /// fixed-width elements.
    pub(crate) fn element_size(self) -> u64 {
        match self {
            Table::IntArray | Table::FloatArray | Table::UIntArray | Table::EnumArray => 4,
            Table::Vector2 | Table::Vector2Array => 8,
            Table::Vector3 | Table::Vector3Array => 12,
            Table::WString16 | Table::WString16Array => 32,
            Table::WString32 | Table::WString32Array => 64,
            Table::WString64 | Table::WString64Array => 128,
            Table::String16 | Table::String16Array => 16,
            Table::String32 | Table::String32Array => 32,
            Table::String64 | Table::String64Array => 64,
            Table::Int64 | Table::Int64Array | Table::UInt64 | Table::UInt64Array => 8,
            Table::Binary | Table::BinaryArray => 4,
            _ => 0,
        }
    }

    /// Whether the save-data layout stores an element count for this table.
    pub(crate) fn is_counted(self) -> bool {
        self.name().contains("Array")
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
