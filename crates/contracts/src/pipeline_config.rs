//! Pipeline configuration contracts shared across crates.

use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Decode stage configuration
    #[serde(default)]
    pub decode: DecodeConfig,

    /// Continuity detection configuration
    #[serde(default)]
    pub continuity: ContinuityConfig,

    /// Logging/metrics configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Decode worker-pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Number of decode workers
    pub workers: usize,

    /// Bounded channel capacity between the source and the workers
    pub channel_capacity: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            channel_capacity: 64,
        }
    }
}

/// Continuity detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuityConfig {
    /// Timing slack added to the expected packet length when looking for
    /// gaps, in seconds
    pub allowed_timing_error_s: f64,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            allowed_timing_error_s: 5.0,
        }
    }
}

/// Logging and metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log format: "json", "pretty" or "compact"
    pub format: String,

    /// Default log level when RUST_LOG is unset
    pub level: String,

    /// Prometheus exporter port (None = disabled)
    pub metrics_port: Option<u16>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            level: "info".to_string(),
            metrics_port: None,
        }
    }
}
