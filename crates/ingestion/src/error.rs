//! Ingestion error types

use thiserror::Error;

/// Decode errors. Fatal per file: one bad envelope never aborts the batch.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Buffer shorter than the 4-byte size prefix
    #[error("envelope truncated: {len} bytes, need at least 4")]
    TruncatedEnvelope {
        /// Buffer length
        len: usize,
    },

    /// Size prefix declared an empty message
    #[error("envelope declares zero uncompressed size")]
    ZeroSize,

    /// LZ4 block decompression failed
    #[error("lz4 decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// Decompressed length contradicts the size prefix
    #[error("decompressed size mismatch: envelope declared {expected}, got {actual}")]
    SizeMismatch {
        /// Size from the envelope prefix
        expected: usize,
        /// Actual decompressed length
        actual: usize,
    },

    /// Serialized schema message could not be read or written
    #[error("schema message codec failed: {0}")]
    Schema(#[from] bincode::Error),
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, DecodeError>;
