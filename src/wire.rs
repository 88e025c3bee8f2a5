// Length-prefixed string encoding shared by the changelog, the archive
// location cache and the native document codec.
//
// Lengths are 7-bit variable-length integers, least-significant group first.
// Each byte has bit 7 set except the final byte. This is the layout .NET's
// `BinaryWriter.Write(string)` produces, which the changelog and cache files
// were specified against.

use std::io::{self, Read, Write};

/// Maximum encoded length for a 32-bit value (ceil(32/7) = 5).
const MAX_VARINT_LEN: usize = 5;

// ---------------------------------------------------------------------------
// Integers
// ---------------------------------------------------------------------------

/// Encode `num` into `buf`, returning the number of bytes used (1..=5).
#[inline]
pub fn encode_u32(mut num: u32, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    while num >= 0x80 {
        buf[i] = (num as u8) | 0x80;
        num >>= 7;
        i += 1;
    }
    buf[i] = num as u8;
    i + 1
}

pub fn write_u32<W: Write>(w: &mut W, num: u32) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u32(num, &mut buf);
    w.write_all(&buf[..len])
}

/// Read a 7-bit encoded `u32` from a streaming source.
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut val: u32 = 0;
    let mut buf = [0u8; 1];
    for shift in (0..MAX_VARINT_LEN as u32 * 7).step_by(7) {
        r.read_exact(&mut buf)?;
        let byte = buf[0];
        // The fifth byte may only carry the top four bits.
        if shift == 28 && byte > 0x0F {
            return Err(invalid("varint overflow"));
        }
        val |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(val);
        }
    }
    Err(invalid("varint overflow"))
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let len = u32::try_from(s.len()).map_err(|_| invalid("string longer than 4 GiB"))?;
    write_u32(w, len)?;
    w.write_all(s.as_bytes())
}

pub fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let len = read_u32(r)? as usize;
    let mut bytes = Vec::new();
    // `take` bounds the allocation by what the stream can actually supply.
    r.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated string",
        ));
    }
    String::from_utf8(bytes).map_err(|_| invalid("string is not valid UTF-8"))
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
