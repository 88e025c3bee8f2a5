// Document tree node.
//
// A `Document` is a tagged union over the scalar and container kinds of the
// hierarchical game-document format. Every node is exclusively owned by its
// parent; there is no sharing and no back-reference.
//
// Equality is *content* equality: maps compare independently of insertion
// order and floats compare by bit pattern, so `a == b` holds exactly when the
// canonical encodings of `a` and `b` are byte-identical.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

/// Ordered string-keyed map (insertion order is preserved, keys are unique).
pub type Map = IndexMap<String, Document>;
/// uint32-keyed hash map.
pub type HashMap32 = BTreeMap<u32, Document>;
/// uint64-keyed hash map.
pub type HashMap64 = BTreeMap<u64, Document>;

/// A node of the document tree.
#[derive(Debug, Clone, Default)]
pub enum Document {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    String(String),
    Array(Vec<Document>),
    Map(Map),
    HashMap32(HashMap32),
    HashMap64(HashMap64),
}

/// Discriminant of a [`Document`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Null,
    Bool,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    String,
    Array,
    Map,
    HashMap32,
    HashMap64,
}

impl DocumentKind {
    /// Whether nodes of this kind hold child nodes.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Array | Self::Map | Self::HashMap32 | Self::HashMap64
        )
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::String => "string",
            Self::Array => "array",
            Self::Map => "map",
            Self::HashMap32 => "hashmap32",
            Self::HashMap64 => "hashmap64",
        };
        f.write_str(name)
    }
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Null => DocumentKind::Null,
            Self::Bool(_) => DocumentKind::Bool,
            Self::Int32(_) => DocumentKind::Int32,
            Self::UInt32(_) => DocumentKind::UInt32,
            Self::Int64(_) => DocumentKind::Int64,
            Self::UInt64(_) => DocumentKind::UInt64,
            Self::Float32(_) => DocumentKind::Float32,
            Self::String(_) => DocumentKind::String,
            Self::Array(_) => DocumentKind::Array,
            Self::Map(_) => DocumentKind::Map,
            Self::HashMap32(_) => DocumentKind::HashMap32,
            Self::HashMap64(_) => DocumentKind::HashMap64,
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    /// True when both nodes are containers of the same kind, i.e. one can be
    /// diffed against or patched onto the other.
    pub fn same_container(&self, other: &Document) -> bool {
        self.is_container() && self.kind() == other.kind()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float32(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer node whose value fits in an `i32`.
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i128().and_then(|v| i32::try_from(v).ok())
    }

    /// Any integer node whose value fits in a `u32`.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_i128().and_then(|v| u32::try_from(v).ok())
    }

    /// Any integer node whose value fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    /// Any integer node whose value fits in a `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|v| u64::try_from(v).ok())
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Int32(v) => Some(i128::from(*v)),
            Self::UInt32(v) => Some(i128::from(*v)),
            Self::Int64(v) => Some(i128::from(*v)),
            Self::UInt64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Document>> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Document>> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Shorthand for a string-keyed lookup on a `Map` node.
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_map().and_then(|m| m.get(key))
    }
}

// ---------------------------------------------------------------------------
// Content equality
// ---------------------------------------------------------------------------

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::UInt32(a), Self::UInt32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::UInt64(a), Self::UInt64(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Self::HashMap32(a), Self::HashMap32(b)) => a == b,
            (Self::HashMap64(a), Self::HashMap64(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Document {}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Document {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    String => String,
    Vec<Document> => Array,
    Map => Map,
    HashMap32 => HashMap32,
    HashMap64 => HashMap64,
}

impl From<&str> for Document {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl<K: Into<String>, V: Into<Document>> FromIterator<(K, V)> for Document {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
