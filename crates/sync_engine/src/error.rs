//! Sync engine error types

use thiserror::Error;

/// Time-sync errors. Fatal for the whole packet list: the caller must
/// re-segment by configuration and call again.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Audio sample rate changed mid-list
    #[error(
        "sample rate drift at packet {packet_index}: expected {expected} Hz, got {actual} Hz"
    )]
    SampleRateMismatch {
        packet_index: usize,
        expected: f64,
        actual: f64,
    },

    /// Device monotonic epoch changed mid-list
    #[error("mach time zero drift at packet {packet_index}: expected {expected}, got {actual}")]
    MachTimeZeroMismatch {
        packet_index: usize,
        expected: i64,
        actual: i64,
    },

    /// A packet has no microphone channel to anchor the reference clock
    #[error("packet {packet_index} has no microphone channel")]
    MissingReferenceChannel { packet_index: usize },

    /// Schema-level failure while reading the tri-message channel
    #[error(transparent)]
    Schema(#[from] contracts::SchemaError),
}

/// Sync engine Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;
