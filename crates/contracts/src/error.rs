//! Layered error contracts
//!
//! Categorized by source: schema access / channel arithmetic / configuration.
//! Decode, sync, and concatenation errors live in their owning crates.

use thiserror::Error;

use crate::PayloadTag;

/// Schema-boundary errors: a required payload variant is absent or not
/// usable for the requested operation. Fatal per channel access.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The channel exists but its payload variant cannot serve the request
    #[error("unsupported payload variant {tag} on sensor '{sensor_name}'")]
    UnsupportedPayload {
        sensor_name: String,
        tag: PayloadTag,
    },

    /// A required payload is absent entirely
    #[error("missing payload on sensor '{sensor_name}'")]
    MissingPayload { sensor_name: String },
}

/// Channel-model arithmetic errors. Fatal per operation.
///
/// Absence of optional data is never a `ChannelError`; these mark payloads
/// whose shape contradicts their component list.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Component offset does not fit the interleave stride
    #[error("component offset {offset} out of range for stride {stride}")]
    ComponentOutOfRange { offset: usize, stride: usize },

    /// Stride larger than the payload it indexes
    #[error("stride {stride} exceeds payload length {payload_len}")]
    StrideExceedsPayload { stride: usize, payload_len: usize },

    /// Payload length does not divide into whole components
    #[error("payload length {payload_len} not divisible by stride {stride}")]
    NonDivisiblePayload { payload_len: usize, stride: usize },

    /// Interleave requires at least two arrays
    #[error("interleave requires at least 2 arrays, got {arity}")]
    InterleaveArity { arity: usize },

    /// Interleave arrays must share one length
    #[error("interleave length mismatch: expected {expected}, got {actual}")]
    InterleaveLengthMismatch { expected: usize, actual: usize },

    /// Statistics array absent or misaligned on a populated channel
    #[error("statistics array '{which}' missing or misaligned on sensor '{sensor_name}'")]
    MissingStatistics {
        sensor_name: String,
        which: &'static str,
    },

    /// Mixed payload variants where one variant was required
    #[error("payload variant mismatch: expected {expected}, got {actual}")]
    PayloadVariantMismatch {
        expected: PayloadTag,
        actual: PayloadTag,
    },
}

/// Configuration errors surfaced by the config loader.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    Validation { field: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create a configuration parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
