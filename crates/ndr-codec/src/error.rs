//! NDR error types

use thiserror::Error;

/// NDR encoding/decoding errors
#[derive(Debug, Error)]
pub enum NdrError {
    /// Buffer underflow - not enough data left for a read
    #[error("buffer underflow: needed {needed} bytes, have {have}")]
    BufferUnderflow { needed: usize, have: usize },

    /// A decoded size prefix is larger than the data that follows it
    #[error("buffer overflow for size {size}: {remaining} bytes remaining")]
    MalformedSize { size: u64, remaining: usize },

    /// Size does not fit the size word of the active transfer syntax
    #[error("size {0} does not fit the transfer syntax size word")]
    SizeOverflow(u64),

    /// Pointees still queued when the pass ended
    #[error("unresolved referents: {pending} deferred pointees never flushed")]
    UnresolvedReferent { pending: usize },

    /// Pointees nested deeper than [`MAX_NESTING_DEPTH`](crate::MAX_NESTING_DEPTH)
    #[error("pointees nested too deep: depth {depth}")]
    NestingTooDeep { depth: usize },

    /// Invalid pointer - unexpected referent ID
    #[error("invalid pointer: referent ID {0}")]
    InvalidPointer(u64),

    /// Invalid string - bad offset or encoding
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// Varying array bounds exceed the conformance
    #[error("conformance mismatch: max_count={max_count}, actual_count={actual_count}")]
    ConformanceMismatch { max_count: u64, actual_count: u64 },

    /// Invalid discriminant for union
    #[error("invalid union discriminant: {0}")]
    InvalidDiscriminant(i64),

    /// Invalid enum value
    #[error("invalid enum value: {0}")]
    InvalidEnumValue(u32),

    /// Unknown transfer syntax name
    #[error("unknown transfer syntax: {0}")]
    UnknownSyntax(String),

    /// UTF-8 decoding error
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// UTF-16 decoding error
    #[error("UTF-16 error: {0}")]
    Utf16Error(#[from] std::char::DecodeUtf16Error),
}

/// Coarse classification of [`NdrError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Not enough bytes remain for a read
    TruncatedBuffer,
    /// A size prefix exceeds the remaining input
    MalformedSize,
    /// A referent without its deferred pointee
    UnresolvedReferent,
    /// A value cannot be represented on the wire
    Capacity,
    /// Anything else that is structurally wrong with the data
    InvalidData,
}

impl NdrError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NdrError::BufferUnderflow { .. } => ErrorKind::TruncatedBuffer,
            NdrError::MalformedSize { .. } => ErrorKind::MalformedSize,
            NdrError::UnresolvedReferent { .. } => ErrorKind::UnresolvedReferent,
            NdrError::SizeOverflow(_) => ErrorKind::Capacity,
            _ => ErrorKind::InvalidData,
        }
    }
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;
