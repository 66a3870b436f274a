//! Error type for binary encoding and decoding.

use thiserror::Error;

/// Result alias for fallible io operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors produced while reading or writing the binary formats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// The input ended before the requested number of bytes could be read.
    #[error("unexpected end of input: needed {requested} bytes, {available} available")]
    EndOfStream { requested: usize, available: usize },

    /// A var-int used a wider form than its value requires.
    #[error("non-canonical var-int encoding for value {value}")]
    NonCanonicalVarInt { value: u64 },

    /// A length prefix exceeded the caller-supplied bound.
    #[error("length {len} exceeds maximum {max}")]
    Oversized { len: usize, max: usize },

    /// A decoded string was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Input remained after a complete value was decoded.
    #[error("{remaining} trailing bytes after decoded value")]
    TrailingBytes { remaining: usize },

    /// The bytes decoded, but the decoded value is not acceptable.
    #[error("invalid data: {message}")]
    InvalidData { message: String },
}

impl IoError {
    /// Builds an [`IoError::InvalidData`] from any displayable message.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        IoError::InvalidData {
            message: message.into(),
        }
    }
}
