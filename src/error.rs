//! Error types and the related `Result<T>`

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PartialZipError>;

#[derive(Debug, Error)]
pub enum PartialZipError {
    /// The server answered the range probe with something other than
    /// `206 Partial Content`.
    #[error("{0} does not support byte ranges")]
    RangesNotSupported(String),

    /// An error from the HTTP client (connect, timeout, body read...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A ranged fetch came back with the wrong status, length or headers.
    #[error("unexpected response for bytes {start}-{end}: {detail}")]
    UnexpectedResponse { start: u64, end: u64, detail: String },

    /// An error from underlying I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A decoded record failed its signature, size or ZIP64 checks.
    #[error("invalid {structure} at offset {offset}: {reason}")]
    InvalidArchive {
        structure: &'static str,
        offset: u64,
        reason: String,
    },

    /// A file wasn't found at the provided path
    #[error("no file in the archive with the path {0}")]
    FileNotFound(String),

    #[error("unsupported compression method {method} for {name}")]
    UnsupportedCompression { method: u16, name: String },

    /// The entry uses a feature this reader does not handle (encryption).
    #[error("unsupported entry {name}: {reason}")]
    Unsupported { name: String, reason: &'static str },

    #[error("failed to decompress {name}: {reason}")]
    Decompress { name: String, reason: String },

    #[error("CRC-32 mismatch for {name}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Listing or downloading was attempted before `open()` succeeded.
    #[error("the archive must be opened first")]
    NotOpen,
}

impl PartialZipError {
    pub(crate) fn invalid(
        structure: &'static str,
        offset: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArchive {
            structure,
            offset,
            reason: reason.into(),
        }
    }
}
