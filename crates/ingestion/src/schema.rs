//! Wire schema boundary
//!
//! The message layout inside the envelope is owned by an external
//! serialization definition; these types mirror its documented field set and
//! nothing else. The pipeline depends only on these stable identifiers;
//! schema internals (field numbering, codegen) stay on the collaborator's
//! side of the fence.

use contracts::{ChannelPayload, ChannelType};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Packet-level wire message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePacket {
    /// Schema api level
    pub api: u32,

    /// Recorder device id
    pub device_id: String,

    /// Install uuid
    pub uuid: String,

    /// Authenticated account email
    pub auth_email: String,

    /// Server authentication token
    pub auth_token: String,

    /// App file start, wall clock, µs since epoch
    pub app_start_epoch_us: i64,

    /// App file start, machine clock, µs
    pub app_start_mach_us: i64,

    /// Device monotonic epoch, µs
    pub mach_time_zero: i64,

    /// Ordered packet metadata pairs
    pub metadata: Vec<(String, String)>,

    /// Fixed-rate channels
    pub evenly_sampled: Vec<WireEvenlySampledChannel>,

    /// Explicitly-timestamped channels
    pub unevenly_sampled: Vec<WireUnevenlySampledChannel>,
}

/// Shared wire channel body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChannelBody {
    pub sensor_name: String,
    pub channel_types: Vec<ChannelType>,
    pub payload: ChannelPayload,
    pub metadata: Vec<(String, String)>,
    pub value_means: Vec<f64>,
    pub value_stds: Vec<f64>,
    pub value_medians: Vec<f64>,
}

/// Fixed-rate wire channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvenlySampledChannel {
    pub body: WireChannelBody,
    pub sample_rate_hz: f64,
    pub first_sample_timestamp_us: i64,
}

/// Explicitly-timestamped wire channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireUnevenlySampledChannel {
    pub body: WireChannelBody,
    pub timestamps_us: Vec<i64>,
    pub sample_interval_mean_us: f64,
    pub sample_interval_std_us: f64,
    pub sample_interval_median_us: f64,
}

/// Deserialize a raw schema message.
pub fn decode_message(raw: &[u8]) -> Result<WirePacket> {
    Ok(bincode::deserialize(raw)?)
}

/// Serialize a schema message (producer side; used by tests and fixtures).
pub fn encode_message(msg: &WirePacket) -> Result<Vec<u8>> {
    Ok(bincode::serialize(msg)?)
}
