//! Channel model - typed sensor channels with interleaved payloads
//!
//! A channel carries one payload array shared by one or more logical
//! components (e.g. latitude/longitude/altitude packed at a fixed stride).
//! The component order in `channel_types` defines the interleave stride.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

use crate::{ChannelError, OrderedFields};

/// Logical component tags defined by the wire schema.
///
/// A channel's `channel_types` list holds one tag per interleaved component;
/// the list order is the interleave order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Microphone,
    Barometer,
    Latitude,
    Longitude,
    Altitude,
    Speed,
    Accuracy,
    TimeSynchronization,
    AccelerometerX,
    AccelerometerY,
    AccelerometerZ,
    GyroscopeX,
    GyroscopeY,
    GyroscopeZ,
    Light,
    Infrared,
    Other,
}

impl ChannelType {
    /// Every tag the schema defines, in schema order.
    ///
    /// Used by continuity fingerprinting to probe for sensor presence.
    pub const ALL: [ChannelType; 17] = [
        ChannelType::Microphone,
        ChannelType::Barometer,
        ChannelType::Latitude,
        ChannelType::Longitude,
        ChannelType::Altitude,
        ChannelType::Speed,
        ChannelType::Accuracy,
        ChannelType::TimeSynchronization,
        ChannelType::AccelerometerX,
        ChannelType::AccelerometerY,
        ChannelType::AccelerometerZ,
        ChannelType::GyroscopeX,
        ChannelType::GyroscopeY,
        ChannelType::GyroscopeZ,
        ChannelType::Light,
        ChannelType::Infrared,
        ChannelType::Other,
    ];
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Payload variant discriminant, usable without borrowing the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadTag {
    Bytes,
    U32,
    U64,
    I32,
    I64,
    F32,
    F64,
}

impl std::fmt::Display for PayloadTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Channel payload: exactly one of the seven schema variants is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPayload {
    Bytes(Bytes),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Collect every `stride`-th element starting at `offset`.
fn strided<T: Copy>(data: &[T], offset: usize, stride: usize) -> Vec<T> {
    data.iter().skip(offset).step_by(stride).copied().collect()
}

/// Round-robin merge of equal-length arrays: `result[i::n] = arrays[i]`.
fn interleave_vecs<T: Copy>(arrays: &[Vec<T>]) -> Result<Vec<T>, ChannelError> {
    if arrays.len() < 2 {
        return Err(ChannelError::InterleaveArity { arity: arrays.len() });
    }
    let len = arrays[0].len();
    for arr in &arrays[1..] {
        if arr.len() != len {
            return Err(ChannelError::InterleaveLengthMismatch {
                expected: len,
                actual: arr.len(),
            });
        }
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    let n = arrays.len();
    let mut out = vec![arrays[0][0]; len * n];
    for (i, arr) in arrays.iter().enumerate() {
        for (j, value) in arr.iter().enumerate() {
            out[j * n + i] = *value;
        }
    }
    Ok(out)
}

impl ChannelPayload {
    /// Which of the seven variants is populated.
    pub fn tag(&self) -> PayloadTag {
        match self {
            ChannelPayload::Bytes(_) => PayloadTag::Bytes,
            ChannelPayload::U32(_) => PayloadTag::U32,
            ChannelPayload::U64(_) => PayloadTag::U64,
            ChannelPayload::I32(_) => PayloadTag::I32,
            ChannelPayload::I64(_) => PayloadTag::I64,
            ChannelPayload::F32(_) => PayloadTag::F32,
            ChannelPayload::F64(_) => PayloadTag::F64,
        }
    }

    /// Element count of the populated variant.
    pub fn len(&self) -> usize {
        match self {
            ChannelPayload::Bytes(b) => b.len(),
            ChannelPayload::U32(v) => v.len(),
            ChannelPayload::U64(v) => v.len(),
            ChannelPayload::I32(v) => v.len(),
            ChannelPayload::I64(v) => v.len(),
            ChannelPayload::F32(v) => v.len(),
            ChannelPayload::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric view of the payload as f64.
    ///
    /// The bytes variant has no numeric interpretation and yields an empty
    /// vector; validators report it where a numeric payload was required.
    pub fn as_f64(&self) -> Vec<f64> {
        match self {
            ChannelPayload::Bytes(_) => Vec::new(),
            ChannelPayload::U32(v) => v.iter().map(|x| *x as f64).collect(),
            ChannelPayload::U64(v) => v.iter().map(|x| *x as f64).collect(),
            ChannelPayload::I32(v) => v.iter().map(|x| *x as f64).collect(),
            ChannelPayload::I64(v) => v.iter().map(|x| *x as f64).collect(),
            ChannelPayload::F32(v) => v.iter().map(|x| *x as f64).collect(),
            ChannelPayload::F64(v) => v.clone(),
        }
    }

    /// Extract one component (`payload[offset::stride]`) keeping the native
    /// variant. Callers validate offset/stride beforehand.
    pub fn component(&self, offset: usize, stride: usize) -> ChannelPayload {
        match self {
            ChannelPayload::Bytes(b) => {
                ChannelPayload::Bytes(Bytes::from(strided(b.as_ref(), offset, stride)))
            }
            ChannelPayload::U32(v) => ChannelPayload::U32(strided(v, offset, stride)),
            ChannelPayload::U64(v) => ChannelPayload::U64(strided(v, offset, stride)),
            ChannelPayload::I32(v) => ChannelPayload::I32(strided(v, offset, stride)),
            ChannelPayload::I64(v) => ChannelPayload::I64(strided(v, offset, stride)),
            ChannelPayload::F32(v) => ChannelPayload::F32(strided(v, offset, stride)),
            ChannelPayload::F64(v) => ChannelPayload::F64(strided(v, offset, stride)),
        }
    }

    /// Concatenate same-variant payload parts in order.
    pub fn concat(parts: &[&ChannelPayload]) -> Result<ChannelPayload, ChannelError> {
        let first = parts.first().ok_or(ChannelError::InterleaveArity { arity: 0 })?;
        let expected = first.tag();
        for part in parts {
            if part.tag() != expected {
                return Err(ChannelError::PayloadVariantMismatch {
                    expected,
                    actual: part.tag(),
                });
            }
        }
        macro_rules! concat_variant {
            ($variant:ident) => {{
                let mut out = Vec::new();
                for part in parts {
                    if let ChannelPayload::$variant(v) = part {
                        out.extend_from_slice(v);
                    }
                }
                Ok(ChannelPayload::$variant(out))
            }};
        }
        match expected {
            PayloadTag::Bytes => {
                let mut out = Vec::new();
                for part in parts {
                    if let ChannelPayload::Bytes(b) = part {
                        out.extend_from_slice(b);
                    }
                }
                Ok(ChannelPayload::Bytes(Bytes::from(out)))
            }
            PayloadTag::U32 => concat_variant!(U32),
            PayloadTag::U64 => concat_variant!(U64),
            PayloadTag::I32 => concat_variant!(I32),
            PayloadTag::I64 => concat_variant!(I64),
            PayloadTag::F32 => concat_variant!(F32),
            PayloadTag::F64 => concat_variant!(F64),
        }
    }

    /// Re-interleave same-variant component payloads (round-robin merge),
    /// keeping the native variant.
    pub fn interleave(components: &[ChannelPayload]) -> Result<ChannelPayload, ChannelError> {
        if components.len() < 2 {
            return Err(ChannelError::InterleaveArity {
                arity: components.len(),
            });
        }
        let expected = components[0].tag();
        for part in components {
            if part.tag() != expected {
                return Err(ChannelError::PayloadVariantMismatch {
                    expected,
                    actual: part.tag(),
                });
            }
        }
        macro_rules! interleave_variant {
            ($variant:ident) => {{
                let arrays: Vec<_> = components
                    .iter()
                    .filter_map(|p| match p {
                        ChannelPayload::$variant(v) => Some(v.clone()),
                        _ => None,
                    })
                    .collect();
                interleave_vecs(&arrays).map(ChannelPayload::$variant)
            }};
        }
        match expected {
            PayloadTag::Bytes => {
                let arrays: Vec<Vec<u8>> = components
                    .iter()
                    .filter_map(|p| match p {
                        ChannelPayload::Bytes(b) => Some(b.to_vec()),
                        _ => None,
                    })
                    .collect();
                interleave_vecs(&arrays).map(|v| ChannelPayload::Bytes(Bytes::from(v)))
            }
            PayloadTag::U32 => interleave_variant!(U32),
            PayloadTag::U64 => interleave_variant!(U64),
            PayloadTag::I32 => interleave_variant!(I32),
            PayloadTag::I64 => interleave_variant!(I64),
            PayloadTag::F32 => interleave_variant!(F32),
            PayloadTag::F64 => interleave_variant!(F64),
        }
    }
}

/// Round-robin merge of 2 or more equal-length numeric component arrays.
///
/// `result[i::n] = arrays[i]`. Fewer than 2 arrays or a length mismatch is a
/// `ChannelError`.
pub fn interleave(arrays: &[Vec<f64>]) -> Result<Vec<f64>, ChannelError> {
    interleave_vecs(arrays)
}

/// Common channel body shared by evenly and unevenly sampled channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Sensor name as reported by the device
    pub sensor_name: String,

    /// Ordered component tags; order defines the interleave stride
    pub channel_types: Vec<ChannelType>,

    /// The packed payload, one variant populated
    pub payload: ChannelPayload,

    /// Channel-level metadata pairs
    pub metadata: Vec<(String, String)>,

    /// Per-component means, aligned 1:1 with `channel_types` (may be empty)
    pub value_means: Vec<f64>,

    /// Per-component standard deviations, aligned with `channel_types`
    pub value_stds: Vec<f64>,

    /// Per-component medians, aligned with `channel_types`
    pub value_medians: Vec<f64>,
}

impl Channel {
    /// Which payload variant is populated.
    pub fn payload_tag(&self) -> PayloadTag {
        self.payload.tag()
    }

    /// Interleave stride = number of components.
    pub fn stride(&self) -> usize {
        self.channel_types.len()
    }

    /// Position of a component in the interleave order.
    pub fn component_offset(&self, component: ChannelType) -> Option<usize> {
        self.channel_types.iter().position(|ct| *ct == component)
    }

    pub fn has_component(&self, component: ChannelType) -> bool {
        self.component_offset(component).is_some()
    }

    /// Number of samples per component.
    pub fn sample_count(&self) -> usize {
        let stride = self.stride();
        if stride == 0 {
            0
        } else {
            self.payload.len() / stride
        }
    }

    /// Checks the interleave arithmetic is well-formed for this payload.
    ///
    /// `offset` must lie inside the stride, the stride must fit the payload,
    /// and the payload length must divide evenly into components.
    fn check_stride(&self, offset: usize) -> Result<(), ChannelError> {
        let stride = self.stride();
        if stride == 0 || offset >= stride {
            return Err(ChannelError::ComponentOutOfRange { offset, stride });
        }
        let len = self.payload.len();
        if stride > len {
            return Err(ChannelError::StrideExceedsPayload {
                stride,
                payload_len: len,
            });
        }
        if len % stride != 0 {
            return Err(ChannelError::NonDivisiblePayload {
                payload_len: len,
                stride,
            });
        }
        Ok(())
    }

    /// Deinterleave one component as a numeric sequence.
    ///
    /// Absent component or empty payload yields an empty vector (absence is
    /// not an error); a malformed stride/payload combination is a
    /// `ChannelError`.
    pub fn payload_for(&self, component: ChannelType) -> Result<Vec<f64>, ChannelError> {
        let offset = match self.component_offset(component) {
            Some(offset) => offset,
            None => return Ok(Vec::new()),
        };
        if self.payload.is_empty() {
            return Ok(Vec::new());
        }
        self.check_stride(offset)?;
        Ok(strided(&self.payload.as_f64(), offset, self.stride()))
    }

    /// Deinterleave one component keeping the native payload variant.
    pub fn native_payload_for(&self, component: ChannelType) -> Result<ChannelPayload, ChannelError> {
        let offset = match self.component_offset(component) {
            Some(offset) => offset,
            None => return Ok(self.payload.clone_empty()),
        };
        if self.payload.is_empty() {
            return Ok(self.payload.clone_empty());
        }
        self.check_stride(offset)?;
        Ok(self.payload.component(offset, self.stride()))
    }

    /// Deinterleave the requested components, then re-interleave them in the
    /// requested order. A single-component request short-circuits to
    /// `payload_for`.
    pub fn multi_payload(&self, components: &[ChannelType]) -> Result<Vec<f64>, ChannelError> {
        match components {
            [] => Err(ChannelError::InterleaveArity { arity: 0 }),
            [single] => self.payload_for(*single),
            _ => {
                let mut arrays = Vec::with_capacity(components.len());
                for component in components {
                    arrays.push(self.payload_for(*component)?);
                }
                interleave(&arrays)
            }
        }
    }

    /// Per-component mean. Absent component yields the 0.0 sentinel; a
    /// missing statistics array on a populated channel is malformed data.
    pub fn value_mean(&self, component: ChannelType) -> Result<f64, ChannelError> {
        self.stat_for(component, &self.value_means, "value_means")
    }

    /// Per-component standard deviation; same absence rules as `value_mean`.
    pub fn value_std(&self, component: ChannelType) -> Result<f64, ChannelError> {
        self.stat_for(component, &self.value_stds, "value_stds")
    }

    /// Per-component median; same absence rules as `value_mean`.
    pub fn value_median(&self, component: ChannelType) -> Result<f64, ChannelError> {
        self.stat_for(component, &self.value_medians, "value_medians")
    }

    fn stat_for(
        &self,
        component: ChannelType,
        stats: &[f64],
        which: &'static str,
    ) -> Result<f64, ChannelError> {
        let offset = match self.component_offset(component) {
            Some(offset) => offset,
            None => return Ok(0.0),
        };
        if stats.len() != self.stride() {
            return Err(ChannelError::MissingStatistics {
                sensor_name: self.sensor_name.clone(),
                which,
            });
        }
        Ok(stats[offset])
    }
}

impl ChannelPayload {
    /// Same variant, no elements.
    fn clone_empty(&self) -> ChannelPayload {
        match self {
            ChannelPayload::Bytes(_) => ChannelPayload::Bytes(Bytes::new()),
            ChannelPayload::U32(_) => ChannelPayload::U32(Vec::new()),
            ChannelPayload::U64(_) => ChannelPayload::U64(Vec::new()),
            ChannelPayload::I32(_) => ChannelPayload::I32(Vec::new()),
            ChannelPayload::I64(_) => ChannelPayload::I64(Vec::new()),
            ChannelPayload::F32(_) => ChannelPayload::F32(Vec::new()),
            ChannelPayload::F64(_) => ChannelPayload::F64(Vec::new()),
        }
    }
}

/// Fixed-rate sensor channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvenlySampledChannel {
    /// Common channel body
    pub channel: Channel,

    /// Sample rate in hertz
    pub sample_rate_hz: f64,

    /// Timestamp of the first sample (machine clock, microseconds)
    pub first_sample_timestamp_us: i64,
}

/// Explicitly-timestamped sensor channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnevenlySampledChannel {
    /// Common channel body
    pub channel: Channel,

    /// Per-sample timestamps (machine clock, microseconds), strictly
    /// ascending for well-formed data
    pub timestamps_us: Vec<i64>,

    /// Mean inter-sample interval in microseconds
    pub sample_interval_mean_us: f64,

    /// Inter-sample interval standard deviation in microseconds
    pub sample_interval_std_us: f64,

    /// Median inter-sample interval in microseconds
    pub sample_interval_median_us: f64,
}

impl Deref for EvenlySampledChannel {
    type Target = Channel;

    fn deref(&self) -> &Channel {
        &self.channel
    }
}

impl DerefMut for EvenlySampledChannel {
    fn deref_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }
}

impl Deref for UnevenlySampledChannel {
    type Target = Channel;

    fn deref(&self) -> &Channel {
        &self.channel
    }
}

impl DerefMut for UnevenlySampledChannel {
    fn deref_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }
}

impl OrderedFields for EvenlySampledChannel {
    fn ordered_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sensor_name", self.sensor_name.clone()),
            ("channel_types", format!("{:?}", self.channel_types)),
            ("payload_type", self.payload_tag().to_string()),
            ("sample_rate_hz", format!("{}", self.sample_rate_hz)),
        ]
    }
}

impl OrderedFields for UnevenlySampledChannel {
    fn ordered_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sensor_name", self.sensor_name.clone()),
            ("channel_types", format!("{:?}", self.channel_types)),
            ("payload_type", self.payload_tag().to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location_channel() -> UnevenlySampledChannel {
        UnevenlySampledChannel {
            channel: Channel {
                sensor_name: "gps".to_string(),
                channel_types: vec![
                    ChannelType::Latitude,
                    ChannelType::Longitude,
                    ChannelType::Altitude,
                ],
                // lat0, lon0, alt0, lat1, lon1, alt1
                payload: ChannelPayload::F64(vec![19.7, -155.0, 10.0, 19.8, -155.1, 11.0]),
                metadata: vec![],
                value_means: vec![19.75, -155.05, 10.5],
                value_stds: vec![0.05, 0.05, 0.5],
                value_medians: vec![19.75, -155.05, 10.5],
            },
            timestamps_us: vec![0, 1_000_000],
            sample_interval_mean_us: 1_000_000.0,
            sample_interval_std_us: 0.0,
            sample_interval_median_us: 1_000_000.0,
        }
    }

    #[test]
    fn test_payload_for_deinterleaves() {
        let ch = location_channel();
        assert_eq!(ch.payload_for(ChannelType::Latitude).unwrap(), vec![19.7, 19.8]);
        assert_eq!(
            ch.payload_for(ChannelType::Altitude).unwrap(),
            vec![10.0, 11.0]
        );
    }

    #[test]
    fn test_payload_for_missing_component_is_empty() {
        let ch = location_channel();
        assert!(ch.payload_for(ChannelType::Barometer).unwrap().is_empty());
    }

    #[test]
    fn test_payload_for_non_divisible_errors() {
        let mut ch = location_channel();
        ch.channel.payload = ChannelPayload::F64(vec![1.0, 2.0, 3.0, 4.0]);
        let err = ch.payload_for(ChannelType::Latitude).unwrap_err();
        assert!(matches!(err, ChannelError::NonDivisiblePayload { .. }));
    }

    #[test]
    fn test_interleave_inverse_law() {
        let arrays = vec![vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]];
        let merged = interleave(&arrays).unwrap();
        assert_eq!(merged, vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);

        let a = strided(&merged, 0, 2);
        let b = strided(&merged, 1, 2);
        assert_eq!(a, arrays[0]);
        assert_eq!(b, arrays[1]);
    }

    #[test]
    fn test_interleave_arity_and_length_checks() {
        let one = vec![vec![1.0, 2.0]];
        assert!(matches!(
            interleave(&one).unwrap_err(),
            ChannelError::InterleaveArity { arity: 1 }
        ));

        let mismatched = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            interleave(&mismatched).unwrap_err(),
            ChannelError::InterleaveLengthMismatch { .. }
        ));
    }

    #[test]
    fn test_multi_payload_reorders_components() {
        let ch = location_channel();
        // Request in (lon, lat) order: re-interleaved accordingly
        let merged = ch
            .multi_payload(&[ChannelType::Longitude, ChannelType::Latitude])
            .unwrap();
        assert_eq!(merged, vec![-155.0, 19.7, -155.1, 19.8]);
    }

    #[test]
    fn test_multi_payload_single_short_circuits() {
        let ch = location_channel();
        assert_eq!(
            ch.multi_payload(&[ChannelType::Latitude]).unwrap(),
            ch.payload_for(ChannelType::Latitude).unwrap()
        );
    }

    #[test]
    fn test_stats_sentinel_and_error() {
        let mut ch = location_channel();
        // Absent component: sentinel, not an error
        assert_eq!(ch.value_mean(ChannelType::Barometer).unwrap(), 0.0);
        // Present component: direct index
        assert_eq!(ch.value_mean(ChannelType::Longitude).unwrap(), -155.05);

        // Missing stats array on a populated channel: malformed data
        ch.channel.value_means.clear();
        assert!(matches!(
            ch.value_mean(ChannelType::Latitude).unwrap_err(),
            ChannelError::MissingStatistics { .. }
        ));
    }

    #[test]
    fn test_bytes_payload_numeric_view_is_empty() {
        let payload = ChannelPayload::Bytes(Bytes::from_static(b"\x01\x02"));
        assert!(payload.as_f64().is_empty());
        assert_eq!(payload.tag(), PayloadTag::Bytes);
    }

    #[test]
    fn test_native_concat_and_interleave() {
        let lat = ChannelPayload::I64(vec![1, 2]);
        let lon = ChannelPayload::I64(vec![10, 20]);
        let merged = ChannelPayload::interleave(&[lat, lon]).unwrap();
        assert_eq!(merged, ChannelPayload::I64(vec![1, 10, 2, 20]));

        let doubled = ChannelPayload::concat(&[&merged, &merged]).unwrap();
        assert_eq!(doubled.len(), 8);
        assert_eq!(doubled.tag(), PayloadTag::I64);
    }
}
