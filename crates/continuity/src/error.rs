//! Continuity error types

use thiserror::Error;

/// Concatenation errors. Fatal for that concatenation call.
#[derive(Debug, Error)]
pub enum ConcatenationError {
    /// Packets from more than one device install in one call
    #[error(
        "mixed device identity at packet {packet_index}: expected {expected}, got {actual}"
    )]
    MixedDeviceIdentity {
        expected: String,
        actual: String,
        packet_index: usize,
    },

    /// Machine start timestamps not strictly increasing
    #[error(
        "non-monotonic order at packet {packet_index}: {prev_us} µs followed by {curr_us} µs"
    )]
    NonMonotonicOrder {
        packet_index: usize,
        prev_us: i64,
        curr_us: i64,
    },

    /// A channel disappeared or changed layout inside a contiguous run
    #[error("channel layout mismatch for sensor '{sensor_name}' at packet {packet_index}")]
    ChannelLayoutMismatch {
        sensor_name: String,
        packet_index: usize,
    },

    /// Channel arithmetic failed while merging payloads
    #[error(transparent)]
    Channel(#[from] contracts::ChannelError),
}

/// Continuity Result type alias
pub type Result<T> = std::result::Result<T, ConcatenationError>;
