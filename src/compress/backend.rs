// Compression backends.
//
// A backend is a stateful codec context: it may keep dictionaries or scratch
// buffers between calls and is therefore driven through `&mut self`. Sharing
// one across threads goes through `Compression`, which serializes calls per
// profile.

use std::io;

use super::CompressError;

pub trait CompressBackend: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn compress(&mut self, data: &[u8]) -> io::Result<Vec<u8>>;

    fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError>;
}

// ---------------------------------------------------------------------------
// Zlib backend
// ---------------------------------------------------------------------------

/// Zlib/Deflate backend. Uses the zlib container, so streams carry a header
/// and a checksum and corrupt input is detected.
#[cfg(feature = "zlib")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibBackend {
    level: flate2::Compression,
}

#[cfg(feature = "zlib")]
impl ZlibBackend {
    /// Compression level 0-9.
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level),
        }
    }
}

#[cfg(feature = "zlib")]
impl Default for ZlibBackend {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(feature = "zlib")]
impl CompressBackend for ZlibBackend {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        use flate2::read::ZlibDecoder;
        use io::Read;

        let mut decoder = ZlibDecoder::new(data);
        let mut output = Vec::new();
        decoder
            .read_to_end(&mut output)
            .map_err(|e| CompressError::Corrupt {
                backend: self.name(),
                reason: e.to_string(),
            })?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// LZMA backend
// ---------------------------------------------------------------------------

#[cfg(feature = "lzma")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaBackend;

#[cfg(feature = "lzma")]
impl CompressBackend for LzmaBackend {
    fn name(&self) -> &'static str {
        "lzma"
    }

    fn compress(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut input = io::Cursor::new(data);
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut input, &mut output)?;
        Ok(output)
    }

    fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        let mut input = io::BufReader::new(io::Cursor::new(data));
        let mut output = Vec::new();
        lzma_rs::lzma_decompress(&mut input, &mut output).map_err(|e| {
            CompressError::Corrupt {
                backend: self.name(),
                reason: e.to_string(),
            }
        })?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Passthrough
// ---------------------------------------------------------------------------

/// Stores data unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl CompressBackend for NoCompression {
    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        Ok(data.to_vec())
    }
}
