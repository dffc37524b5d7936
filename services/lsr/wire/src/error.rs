//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Incomplete frame (need more data)
    #[error("incomplete frame")]
    Incomplete,

    /// Size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Unknown frame type
    #[error("unknown type {0}")]
    Type(u8),

    /// Body checksum mismatch
    #[error("body checksum mismatch")]
    Checksum,

    /// Bytes left over after the declared body
    #[error("{0} trailing bytes after frame body")]
    Trailing(usize),

    /// CBOR encoding failed
    #[error("cbor encode failed: {0}")]
    Encode(String),

    /// CBOR body did not decode into the expected record
    #[error("cbor decode failed: {0}")]
    Decode(String),
}
