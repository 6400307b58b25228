//! # CRAM entropy codecs
//!
//! *rANS and adaptive range coding for the byte streams inside CRAM
//! containers.*
//!
//! ## Intuition First
//!
//! A CRAM slice stores each record field (quality scores, read names, tag
//! values) as its own byte stream. These streams have small alphabets and
//! strong local structure, so CRAM compresses them with entropy coders that
//! are cheap to decode and tuned for exactly that: static rANS with per-buffer
//! frequency tables, and an adaptive range coder that learns as it goes.
//!
//! ## The Codecs
//!
//! ```text
//! CRAM 3.0  rANS 4x8     order 0/1, 4 states, byte renormalisation
//! CRAM 3.1  rANS Nx16    order 0/1, 4 or 32 states, 16-bit renormalisation
//!                        + stripe, pack, RLE, CAT transforms
//! CRAM 3.1  arithmetic   adaptive order 0/1 models, RLE run models
//!                        + stripe, pack, CAT, external (bzip2)
//! ```
//!
//! The two CRAM 3.1 codecs share one container: a flags byte, an optional
//! uint7 size, then transform headers and the entropy-coded payload. The
//! flags byte is parsed per family since bit `0x04` means 32-way
//! interleaving for rANS and external compression for the range codec.
//!
//! ## rANS in one line
//!
//! With frequency $f_s$, cumulative frequency $c_s$ and table size $M$,
//! encoding maps state $x$ to
//!
//! ```text
//! C(x, s) = (x / f_s) * M + (x mod f_s) + c_s
//! ```
//!
//! and decoding inverts it from the low bits of the state. Several
//! independent states take turns on one byte stream; which state reads next
//! is part of the format.
//!
//! ## Usage
//!
//! ```
//! use cram_entropy::{FormatFlags, Order, RansNx16};
//!
//! let quals = b"IIIIIIHHHHGGGGIIII####".repeat(10);
//! let mut codec = RansNx16::new();
//! let stream = codec.compress(&quals, FormatFlags::new().order(Order::One).rle(true))?;
//! assert_eq!(codec.uncompress(&stream)?, quals);
//! # Ok::<(), cram_entropy::Error>(())
//! ```
//!
//! ## Failure Modes
//!
//! 1. **Hostile headers**: declared sizes are checked against
//!    [`CodecConfig::max_output_len`] before allocating, and stripe nesting
//!    against [`CodecConfig::max_depth`].
//! 2. **Cross-width streams**: every decoder checks that its states end
//!    where the encoder started them, so a 4-way stream read as 32-way (or
//!    the reverse) is reported as an error rather than decoded to garbage.
//!
//! ## References
//!
//! - Duda, J. (2009). "Asymmetric numeral systems."
//! - Bonfield, J. K. (2022). "CRAMcodecs: the 3.1 codec suite." *Bioinformatics*.
//! - CRAM format specification 3.1, sections on rANS Nx16 and the arithmetic coder.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arith;
pub mod config;
mod container;
pub mod cursor;
pub mod error;
pub mod external;
pub mod flags;
pub mod freq;
pub mod model;
pub mod nx16;
pub mod range_coder;
pub mod rans;
pub mod rans4x8;
pub mod transform;

pub use arith::RangeCodec;
pub use config::CodecConfig;
pub use error::{Error, Result};
pub use external::ExternalCompressor;
#[cfg(feature = "bzip2")]
pub use external::Bzip2;
pub use flags::{FormatFlags, Interleave, Order};
pub use nx16::RansNx16;
pub use rans::{InterleavedRansDecoder, InterleavedRansEncoder};
pub use rans4x8::Rans4x8;
