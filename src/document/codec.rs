// Document binary codecs.
//
// The overlay engine never names a concrete document format: it decodes and
// encodes through `DocumentCodec`. `NativeCodec` is the built-in canonical
// encoding used by the CLI and the test-suite.
//
// Native layout (little-endian):
//
//   magic "MPDC" | version u8 (= 1) | node
//
//   node := tag u8, payload
//     0 Null       -
//     1 Bool       u8
//     2 Int32      i32
//     3 UInt32     u32
//     4 Int64      i64
//     5 UInt64     u64
//     6 Float32    f32 (bit pattern preserved)
//     7 String     string
//     8 Array      u32 count, node*
//     9 Map        u32 count, (string, node)*   keys ascending
//    10 HashMap32  u32 count, (u32, node)*      keys ascending
//    11 HashMap64  u32 count, (u64, node)*      keys ascending
//
// Map keys are written in ascending order, so two content-equal trees always
// encode to identical bytes.

use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::node::{Document, HashMap32, HashMap64, Map};
use crate::wire;

pub const NATIVE_MAGIC: &[u8; 4] = b"MPDC";
pub const NATIVE_VERSION: u8 = 1;

/// Nesting limit when decoding untrusted input.
const MAX_DEPTH: usize = 512;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid document magic")]
    BadMagic,
    #[error("unsupported document version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown node tag {0:#04x}")]
    UnknownTag(u8),
    #[error("document nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,
    #[error("{0} trailing bytes after document root")]
    TrailingData(usize),
    #[error("malformed document: {0}")]
    Format(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Codec trait
// ---------------------------------------------------------------------------

/// Serializer/deserializer for the hierarchical document format.
pub trait DocumentCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Document, DocumentError>;
    fn encode(&self, doc: &Document) -> Result<Vec<u8>, DocumentError>;
}

/// Built-in canonical codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl DocumentCodec for NativeCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Document, DocumentError> {
        let mut r = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != NATIVE_MAGIC {
            return Err(DocumentError::BadMagic);
        }
        let version = r.read_u8()?;
        if version != NATIVE_VERSION {
            return Err(DocumentError::UnsupportedVersion(version));
        }
        let root = read_node(&mut r, 0)?;
        let rest = bytes.len() - r.position() as usize;
        if rest != 0 {
            return Err(DocumentError::TrailingData(rest));
        }
        Ok(root)
    }

    fn encode(&self, doc: &Document) -> Result<Vec<u8>, DocumentError> {
        let mut out = Vec::with_capacity(64);
        out.write_all(NATIVE_MAGIC)?;
        out.write_u8(NATIVE_VERSION)?;
        write_node(&mut out, doc)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn write_len<W: Write>(w: &mut W, len: usize) -> io::Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "container too large"))?;
    w.write_u32::<LittleEndian>(len)
}

fn write_node<W: Write>(w: &mut W, node: &Document) -> io::Result<()> {
    match node {
        Document::Null => w.write_u8(0),
        Document::Bool(v) => {
            w.write_u8(1)?;
            w.write_u8(u8::from(*v))
        }
        Document::Int32(v) => {
            w.write_u8(2)?;
            w.write_i32::<LittleEndian>(*v)
        }
        Document::UInt32(v) => {
            w.write_u8(3)?;
            w.write_u32::<LittleEndian>(*v)
        }
        Document::Int64(v) => {
            w.write_u8(4)?;
            w.write_i64::<LittleEndian>(*v)
        }
        Document::UInt64(v) => {
            w.write_u8(5)?;
            w.write_u64::<LittleEndian>(*v)
        }
        Document::Float32(v) => {
            w.write_u8(6)?;
            w.write_u32::<LittleEndian>(v.to_bits())
        }
        Document::String(s) => {
            w.write_u8(7)?;
            wire::write_string(w, s)
        }
        Document::Array(items) => {
            w.write_u8(8)?;
            write_len(w, items.len())?;
            items.iter().try_for_each(|item| write_node(w, item))
        }
        Document::Map(map) => {
            w.write_u8(9)?;
            write_len(w, map.len())?;
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for key in keys {
                wire::write_string(w, key)?;
                write_node(w, &map[key])?;
            }
            Ok(())
        }
        Document::HashMap32(map) => {
            w.write_u8(10)?;
            write_len(w, map.len())?;
            for (key, value) in map {
                w.write_u32::<LittleEndian>(*key)?;
                write_node(w, value)?;
            }
            Ok(())
        }
        Document::HashMap64(map) => {
            w.write_u8(11)?;
            write_len(w, map.len())?;
            for (key, value) in map {
                w.write_u64::<LittleEndian>(*key)?;
                write_node(w, value)?;
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn read_node(r: &mut Cursor<&[u8]>, depth: usize) -> Result<Document, DocumentError> {
    if depth > MAX_DEPTH {
        return Err(DocumentError::TooDeep);
    }
    let tag = r.read_u8()?;
    let node = match tag {
        0 => Document::Null,
        1 => match r.read_u8()? {
            0 => Document::Bool(false),
            1 => Document::Bool(true),
            other => return Err(DocumentError::Format(format!("bool byte {other}"))),
        },
        2 => Document::Int32(r.read_i32::<LittleEndian>()?),
        3 => Document::UInt32(r.read_u32::<LittleEndian>()?),
        4 => Document::Int64(r.read_i64::<LittleEndian>()?),
        5 => Document::UInt64(r.read_u64::<LittleEndian>()?),
        6 => Document::Float32(f32::from_bits(r.read_u32::<LittleEndian>()?)),
        7 => Document::String(wire::read_string(r)?),
        8 => {
            let count = read_count(r)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_node(r, depth + 1)?);
            }
            Document::Array(items)
        }
        9 => {
            let count = read_count(r)?;
            let mut map = Map::with_capacity(count);
            for _ in 0..count {
                let key = wire::read_string(r)?;
                let value = read_node(r, depth + 1)?;
                if map.insert(key.clone(), value).is_some() {
                    return Err(DocumentError::Format(format!("duplicate map key {key:?}")));
                }
            }
            Document::Map(map)
        }
        10 => {
            let count = read_count(r)?;
            let mut map = HashMap32::new();
            for _ in 0..count {
                let key = r.read_u32::<LittleEndian>()?;
                map.insert(key, read_node(r, depth + 1)?);
            }
            Document::HashMap32(map)
        }
        11 => {
            let count = read_count(r)?;
            let mut map = HashMap64::new();
            for _ in 0..count {
                let key = r.read_u64::<LittleEndian>()?;
                map.insert(key, read_node(r, depth + 1)?);
            }
            Document::HashMap64(map)
        }
        other => return Err(DocumentError::UnknownTag(other)),
    };
    Ok(node)
}

/// Read a container count, capped by the bytes left in the input (every
/// child needs at least one byte).
fn read_count(r: &mut Cursor<&[u8]>) -> Result<usize, DocumentError> {
    let count = r.read_u32::<LittleEndian>()? as usize;
    let remaining = r.get_ref().len() - r.position() as usize;
    if count > remaining {
        return Err(DocumentError::Format(format!(
            "container claims {count} children with {remaining} bytes left"
        )));
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut hm = HashMap32::new();
        hm.insert(7, Document::Float32(1.5));
        let mut root = Map::new();
        root.insert("name".into(), "Link".into());
        root.insert(
            "items".into(),
            Document::Array(vec![Document::Int32(-3), Document::UInt64(u64::MAX)]),
        );
        root.insert("lookup".into(), Document::HashMap32(hm));
        root.insert("flag".into(), Document::Bool(true));
        root.insert("none".into(), Document::Null);
        Document::Map(root)
    }

    #[test]
    fn decode_inverts_encode() {
        let doc = sample();
        let bytes = NativeCodec.encode(&doc).unwrap();
        assert_eq!(NativeCodec.decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn content_equal_maps_encode_identically() {
        let a: Document = [("x", 1i32), ("y", 2)].into_iter().collect();
        let b: Document = [("y", 2i32), ("x", 1)].into_iter().collect();
        assert_eq!(
            NativeCodec.encode(&a).unwrap(),
            NativeCodec.encode(&b).unwrap()
        );
    }

    #[test]
    fn bad_magic_is_rejected() {
        let err = NativeCodec.decode(b"XXXX\x01\x00").unwrap_err();
        assert!(matches!(err, DocumentError::BadMagic));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = NativeCodec.decode(b"MPDC\x02\x00").unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedVersion(2)));
    }

    #[test]
    fn truncated_input_is_an_error() {
        let bytes = NativeCodec.encode(&sample()).unwrap();
        for cut in 0..bytes.len() {
            assert!(NativeCodec.decode(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn oversized_count_is_rejected_without_allocating() {
        let err = NativeCodec
            .decode(b"MPDC\x01\x08\xff\xff\xff\xff")
            .unwrap_err();
        assert!(matches!(err, DocumentError::Format(_)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let err = NativeCodec.decode(b"MPDC\x01\x00\x00").unwrap_err();
        assert!(matches!(err, DocumentError::TrailingData(1)));
    }
}
