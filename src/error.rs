//! Error types for the CRAM entropy codecs.

use thiserror::Error;

/// Error variants for encode and decode operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The input ended before a declared length, table or state was complete.
    #[error("truncated input: needed {needed} more bytes")]
    Truncated {
        /// Bytes missing at the point of failure.
        needed: usize,
    },

    /// The input is structurally invalid.
    #[error("malformed stream: {0}")]
    Malformed(&'static str),

    /// A declared output length exceeds the configured allocation guard.
    #[error("declared output length {len} exceeds limit of {limit} bytes")]
    OutputTooLarge {
        /// Declared length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Nested sub-streams went deeper than the configured limit.
    #[error("nested streams exceed depth {0}")]
    NestingTooDeep(usize),

    /// The requested flag combination is not available on this path.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The delegated external compressor failed.
    #[error("external compressor: {0}")]
    External(String),

    /// An I/O error occurred while driving an external compressor.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
