//! Configuration validation
//!
//! Rules:
//! - decode.workers > 0
//! - decode.channel_capacity > 0
//! - continuity.allowed_timing_error_s >= 0 and finite
//! - log.format is one of json / pretty / compact

use contracts::{ConfigError, PipelineConfig};

/// Validate a parsed pipeline configuration.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
    validate_decode(config)?;
    validate_continuity(config)?;
    validate_log(config)?;
    Ok(())
}

fn validate_decode(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.decode.workers == 0 {
        return Err(ConfigError::validation(
            "decode.workers",
            "workers must be > 0",
        ));
    }
    if config.decode.channel_capacity == 0 {
        return Err(ConfigError::validation(
            "decode.channel_capacity",
            "channel_capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_continuity(config: &PipelineConfig) -> Result<(), ConfigError> {
    let tolerance = config.continuity.allowed_timing_error_s;
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ConfigError::validation(
            "continuity.allowed_timing_error_s",
            format!("allowed_timing_error_s must be finite and >= 0, got {tolerance}"),
        ));
    }
    Ok(())
}

fn validate_log(config: &PipelineConfig) -> Result<(), ConfigError> {
    match config.log.format.as_str() {
        "json" | "pretty" | "compact" => Ok(()),
        other => Err(ConfigError::validation(
            "log.format",
            format!("unknown log format '{other}'"),
        )),
    }
}
