//! Delegation to a general-purpose byte compressor.
//!
//! The range codec's EXT flag hands the whole payload to an outside
//! compressor; CRAM uses bzip2. Callers can plug in their own through
//! [`ExternalCompressor`].

use crate::error::{Error, Result};

/// A whole-buffer byte compressor.
pub trait ExternalCompressor {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Compress `data`.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress `data`, which must expand to exactly `len` bytes.
    fn uncompress(&self, data: &[u8], len: usize) -> Result<Vec<u8>>;
}

/// bzip2 through the pure Rust `bzip2-rs` decoder.
///
/// Decode only: [`ExternalCompressor::compress`] returns
/// [`Error::Unsupported`].
#[cfg(feature = "bzip2")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Bzip2;

#[cfg(feature = "bzip2")]
impl ExternalCompressor for Bzip2 {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn compress(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Unsupported("bzip2 encoding is not available"))
    }

    fn uncompress(&self, data: &[u8], len: usize) -> Result<Vec<u8>> {
        use std::io::Read;

        let mut out = Vec::with_capacity(len);
        // One byte of slack detects streams that expand past `len`.
        bzip2_rs::DecoderReader::new(data)
            .take(len as u64 + 1)
            .read_to_end(&mut out)?;
        if out.len() != len {
            return Err(Error::External(format!(
                "bzip2 produced {} bytes, expected {}",
                out.len(),
                len
            )));
        }
        Ok(out)
    }
}

/// Placeholder used when no compressor was configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExternal;

impl ExternalCompressor for NoExternal {
    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Unsupported("no external compressor configured"))
    }

    fn uncompress(&self, _data: &[u8], _len: usize) -> Result<Vec<u8>> {
        Err(Error::Unsupported("no external compressor configured"))
    }
}

/// The compressor CRAM streams expect: bzip2 when built in.
pub fn default_compressor() -> Box<dyn ExternalCompressor + Send> {
    #[cfg(feature = "bzip2")]
    {
        Box::new(Bzip2)
    }
    #[cfg(not(feature = "bzip2"))]
    {
        Box::new(NoExternal)
    }
}
