//! Common error types for the delta layer.

use thiserror::Error;

/// Result type for delta operations.
pub type DeltaResult<T> = Result<T, DeltaError>;

/// Errors surfaced by delta encoding, decoding, and indexing.
///
/// The taxonomy is flat and carries no payload beyond the kind; every
/// failure is reported to the caller on first detection and nothing is
/// recovered internally.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeltaError {
    /// An allocation failed; any partially built artifact was discarded.
    #[error("could not allocate required memory")]
    OutOfMemory,
    /// Encoding was requested against an index with no sources.
    #[error("a populated delta index is required")]
    IndexNeeded,
    /// A source buffer had no indexable content.
    #[error("source had no content to index")]
    SourceEmpty,
    /// A delta buffer was invalid or corrupt.
    #[error("invalid or corrupt delta")]
    SourceBad,
    /// The target buffer was empty.
    #[error("target buffer was empty")]
    BufferEmpty,
    /// The encoded delta grew past the caller's size limit.
    #[error("delta larger than the requested maximum size")]
    SizeTooBig,
}
