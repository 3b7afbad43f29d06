// Error type shared by every SIS decoding stage.
//
// Each stage returns the first error it hits; nothing is recovered
// mid-archive. Archive-supplied text that ends up inside a message is
// clipped so messages stay bounded.

use thiserror::Error;

/// Longest slice of archive-supplied text embedded in an error message.
const MAX_QUOTED_LEN: usize = 64;

/// Errors produced while decoding or extracting a SIS archive.
#[derive(Debug, Error)]
pub enum SisError {
    /// Underlying read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Repositioning the stream failed.
    #[error("seeking to offset {offset}: {source}")]
    Seek {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// An archive offset points past the end of the stream.
    #[error("offset {offset} is outside the archive ({len} bytes)")]
    OffsetOutOfRange { offset: u64, len: u64 },

    /// Fewer bytes were available than a field needs.
    #[error("unexpected EOF or short read ({got} bytes of {wanted} returned at offset {offset})")]
    ShortRead { wanted: usize, got: usize, offset: u64 },

    /// UID3 does not carry the SIS sentinel.
    #[error("file corrupted or not a SIS file (UID3 {found:#010X})")]
    InvalidMagic { found: u32 },

    /// File table entry with a tag outside 0..=6.
    #[error("unknown file record type {tag} at index {index}")]
    UnknownRecordType { tag: u32, index: usize },

    /// Conditional expression node with an unknown tag.
    #[error("unknown conditional type {0:04x}")]
    UnknownConditionalTag(u32),

    /// Conditional expression nested deeper than the configured limit.
    #[error("conditional expression nested deeper than {max} levels")]
    ExpressionTooDeep { max: usize },

    /// A length-derived buffer could not be allocated.
    #[error("out of memory allocating {len} bytes")]
    OutOfMemory { len: usize },

    /// The zlib stream of a payload is corrupt.
    #[error("zlib reported error trying to uncompress: {0}")]
    DecompressionFailed(String),

    /// A compressed payload was found but zlib support is compiled out.
    #[error("compressed payloads require the `zlib` feature")]
    DecompressionUnavailable,

    /// Decompressed size differs from the declared original length.
    #[error("uncompressed file length does not match (expected {expected}, got {actual})")]
    LengthMismatch { expected: u64, actual: u64 },

    /// An output name reduces to nothing writable.
    #[error("refusing to write unsafe file name {0:?}")]
    UnsafeFileName(String),
}

impl SisError {
    pub(crate) fn unsafe_name(name: &str) -> Self {
        Self::UnsafeFileName(clip(name))
    }
}

/// Convenience alias used throughout the decoder.
pub type Result<T> = std::result::Result<T, SisError>;

fn clip(text: &str) -> String {
    match text.char_indices().nth(MAX_QUOTED_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
