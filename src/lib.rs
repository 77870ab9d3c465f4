//! # Huffpress Library
//!
//! Compress or expand files with Huffman coding over fixed-width symbols
//! * `static_huff` is a two-pass coder: it measures the symbol distribution,
//!   transmits canonical code lengths in the header, and encodes on a second pass
//! * `adaptive_huff` is a one-pass coder: encoder and decoder grow identical
//!   FGK trees as symbols arrive, so the header carries no code table
//! * `periodic_huff` is a one-pass coder that seeds the whole alphabet and
//!   rebuilds its canonical tree from running counts every 2^p symbols
//!
//! Symbols are 1 to 8 bytes wide, packed big-endian.  The adaptive coder can
//! periodically shrink its weights to favor recent statistics, see
//! [`Options::chunk_size`] and [`Options::shrink_factor`].
//!
//! The compression/expansion functions are generics that operate on trait objects
//! with bounds `Read + Seek` or `Write + Seek`.  There are convenience functions
//! for working directly with buffers.
//!
//! ## File Example
//!
//! ```rs
//! use huffpress::*;
//! let mut in_file = std::fs::File::open("some_input_path").expect("open failed");
//! let mut out_file = std::fs::File::create("some_output_path").expect("create failed");
//! let (in_size,out_size) = adaptive_huff::expand(&mut in_file,&mut out_file)
//!     .expect("expansion failed");
//! eprintln!("expanded {} into {}",in_size,out_size);
//! ```
//!
//! ## Buffer Example
//!
//! ```rs
//! use huffpress::*;
//! let test_data = "the quick brown fox jumps over the lazy dog".as_bytes();
//! let compressed = static_huff::compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
//! ```

mod tools;
pub mod static_huff;
pub mod adaptive_huff;
pub mod periodic_huff;

type DYNERR = Box<dyn std::error::Error>;

/// Coding Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("invalid or truncated header")]
    InvalidHeader,
    #[error("bit stream ended off a symbol boundary")]
    MalformedStream,
    #[error("code lengths cannot form a prefix tree")]
    InvalidCodeLengths,
    #[error("tree bookkeeping is inconsistent")]
    InvariantViolation
}

/// Options controlling compression.
/// Expansion needs no options, the stream is self-describing.
#[derive(Clone)]
pub struct Options {
    /// width of a symbol in bytes, 1 through 8
    pub bytes_per_symbol: usize,
    /// adaptive only: input megabytes between weight shrinks, 0 disables
    pub chunk_size: usize,
    /// adaptive only: divisor applied to leaf weights at each shrink
    pub shrink_factor: usize,
    /// periodic only: rebuild the tree every 2^p symbols, 10 <= p <= 20
    pub period_exponent: usize
}

pub const STD_OPTIONS: Options = Options {
    bytes_per_symbol: 1,
    chunk_size: 0,
    shrink_factor: 2,
    period_exponent: 10
};
