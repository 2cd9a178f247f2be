//! Continuity detection
//!
//! Walks an ordered packet run from one device and finds the indices where
//! continuity breaks: a time jump larger than one packet length plus
//! tolerance, or a structural change in the sensor configuration. The
//! results are partition points for the concatenator.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use contracts::{diff, ChannelType, OrderedFields, Packet, PayloadTag};
use tracing::{debug, instrument, warn};

/// One detected continuity break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapResult {
    /// Index of the first packet after the break
    pub index: usize,
    /// Human-readable description of what broke
    pub description: String,
}

impl std::fmt::Display for GapResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gap at packet {}: {}", self.index, self.description)
    }
}

/// Expected audio packet length in seconds, from the microphone channel.
fn packet_length_s(packet: &Packet) -> Option<f64> {
    let mic = packet.microphone()?;
    if mic.sample_rate_hz <= 0.0 {
        return None;
    }
    Some(mic.channel.sample_count() as f64 / mic.sample_rate_hz)
}

/// Reference start time of a packet: the microphone first-sample timestamp.
fn reference_start_us(packet: &Packet) -> Option<i64> {
    packet.microphone().map(|mic| mic.first_sample_timestamp_us)
}

/// Find time gaps between adjacent packets.
///
/// The allowed spacing is the expected packet length (microphone samples /
/// sample rate) plus `allowed_timing_error_s`. After each gap the packet
/// length is re-baselined from the packet that opened it, so a sustained
/// rate change triggers once instead of on every following pair.
#[instrument(name = "identify_time_gaps", skip(packets), fields(packets = packets.len()))]
pub fn identify_time_gaps(packets: &[Packet], allowed_timing_error_s: f64) -> Vec<GapResult> {
    let mut gaps = Vec::new();
    let first = match packets.first() {
        Some(first) => first,
        None => return gaps,
    };

    let mut packet_len_s = match packet_length_s(first) {
        Some(len) => len,
        None => {
            warn!(device_id = %first.device_id, "no microphone channel; gap detection skipped");
            return gaps;
        }
    };
    let mut allowed_gap_s = packet_len_s + allowed_timing_error_s;

    for i in 1..packets.len() {
        let (prev, curr) = (&packets[i - 1], &packets[i]);
        let (prev_start, curr_start) = match (reference_start_us(prev), reference_start_us(curr)) {
            (Some(p), Some(c)) => (p, c),
            _ => continue,
        };
        let diff_s = (curr_start - prev_start) as f64 / 1e6;

        if diff_s > allowed_gap_s {
            let description = format!(
                "start moved {diff_s:.6} s, allowed {allowed_gap_s:.6} s \
                 (packet length {packet_len_s:.6} s + tolerance {allowed_timing_error_s:.6} s)"
            );
            debug!(index = i, %description, "time gap");
            observability::record_time_gap(curr.device_id.as_str(), diff_s);
            gaps.push(GapResult {
                index: i,
                description,
            });

            // Re-baseline from the packet that opened the gap
            if let Some(len) = packet_length_s(curr) {
                packet_len_s = len;
                allowed_gap_s = packet_len_s + allowed_timing_error_s;
            }
        }
    }
    gaps
}

/// Structural identity of one sensor inside a packet.
///
/// Covers exactly what continuity cares about: which sensor it is, at what
/// rate it runs, and which payload variant it produces. An absent sensor is
/// `None`, a stable value equal only to itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SensorSignature {
    sensor_name: String,
    /// Sample rate bit pattern; None for unevenly sampled sensors
    sample_rate_bits: Option<u64>,
    payload_tag: PayloadTag,
}

impl OrderedFields for SensorSignature {
    fn ordered_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sensor_name", self.sensor_name.clone()),
            (
                "sample_rate_hz",
                match self.sample_rate_bits {
                    Some(bits) => format!("{}", f64::from_bits(bits)),
                    None => "none".to_string(),
                },
            ),
            ("payload_type", self.payload_tag.to_string()),
        ]
    }
}

fn sensor_signature(packet: &Packet, component: ChannelType) -> Option<SensorSignature> {
    let handle = packet.channel(component)?;
    Some(SensorSignature {
        sensor_name: handle.sensor_name().to_string(),
        sample_rate_bits: handle.sample_rate_hz().map(f64::to_bits),
        payload_tag: handle.channel().payload_tag(),
    })
}

/// Structural fingerprint of a packet's sensor configuration.
fn packet_fingerprint(packet: &Packet) -> u64 {
    let mut hasher = DefaultHasher::new();
    packet.device_id.as_str().hash(&mut hasher);
    packet.uuid.hash(&mut hasher);
    for component in ChannelType::ALL {
        sensor_signature(packet, component).hash(&mut hasher);
    }
    hasher.finish()
}

/// Find sensor-configuration changes between adjacent packets.
///
/// Returns the index of every packet whose structural fingerprint differs
/// from its predecessor's.
#[instrument(name = "identify_sensor_changes", skip(packets), fields(packets = packets.len()))]
pub fn identify_sensor_changes(packets: &[Packet]) -> Vec<usize> {
    let mut changes = Vec::new();
    let fingerprints: Vec<u64> = packets.iter().map(packet_fingerprint).collect();

    for i in 1..packets.len() {
        if fingerprints[i] != fingerprints[i - 1] {
            observability::record_sensor_change(packets[i].device_id.as_str());
            log_change_detail(&packets[i - 1], &packets[i], i);
            changes.push(i);
        }
    }
    changes
}

/// Log which sensors changed between two packets, field by field.
fn log_change_detail(prev: &Packet, curr: &Packet, index: usize) {
    for component in ChannelType::ALL {
        match (
            sensor_signature(prev, component),
            sensor_signature(curr, component),
        ) {
            (Some(a), Some(b)) if a != b => {
                for field_diff in diff(&a, &b) {
                    debug!(index, component = %component, %field_diff, "sensor changed");
                }
            }
            (Some(a), None) => {
                debug!(index, component = %component, sensor = %a.sensor_name, "sensor removed");
            }
            (None, Some(b)) => {
                debug!(index, component = %component, sensor = %b.sensor_name, "sensor added");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Channel, ChannelPayload, EvenlySampledChannel, UnevenlySampledChannel};

    fn mic_packet(device: &str, start_us: i64, rate: f64, samples: usize) -> Packet {
        Packet {
            device_id: device.into(),
            uuid: "u".to_string(),
            app_start_mach_us: start_us,
            evenly_sampled: vec![EvenlySampledChannel {
                channel: Channel {
                    sensor_name: "mic".to_string(),
                    channel_types: vec![ChannelType::Microphone],
                    payload: ChannelPayload::I32(vec![0; samples]),
                    metadata: vec![],
                    value_means: vec![0.0],
                    value_stds: vec![0.0],
                    value_medians: vec![0.0],
                },
                sample_rate_hz: rate,
                first_sample_timestamp_us: start_us,
            }],
            ..Default::default()
        }
        .indexed()
    }

    fn with_barometer(mut packet: Packet) -> Packet {
        packet.unevenly_sampled.push(UnevenlySampledChannel {
            channel: Channel {
                sensor_name: "baro".to_string(),
                channel_types: vec![ChannelType::Barometer],
                payload: ChannelPayload::F64(vec![101.3]),
                metadata: vec![],
                value_means: vec![101.3],
                value_stds: vec![0.0],
                value_medians: vec![101.3],
            },
            timestamps_us: vec![packet.app_start_mach_us],
            sample_interval_mean_us: 0.0,
            sample_interval_std_us: 0.0,
            sample_interval_median_us: 0.0,
        });
        packet.rebuild_index();
        packet
    }

    #[test]
    fn test_back_to_back_packets_have_no_gaps() {
        // 80 samples at 80 Hz = 1 s per packet; starts exactly 1 s apart
        let packets = vec![
            mic_packet("D", 0, 80.0, 80),
            mic_packet("D", 1_000_000, 80.0, 80),
            mic_packet("D", 2_000_000, 80.0, 80),
        ];
        assert!(identify_time_gaps(&packets, 5.0).is_empty());
    }

    #[test]
    fn test_single_gap_detected_at_index() {
        let packets = vec![
            mic_packet("D", 0, 80.0, 80),
            mic_packet("D", 1_000_000, 80.0, 80),
            mic_packet("D", 10_000_000, 80.0, 80),
        ];
        let gaps = identify_time_gaps(&packets, 5.0);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].index, 2);
        assert!(gaps[0].description.contains("9.0"));
    }

    #[test]
    fn test_rebaseline_after_rate_change() {
        // Rate drops to 8 Hz at index 2: 80 samples now span 10 s. The jump
        // to the 10 s cadence triggers once; afterwards the new baseline
        // keeps 10 s spacing quiet.
        let packets = vec![
            mic_packet("D", 0, 80.0, 80),
            mic_packet("D", 1_000_000, 80.0, 80),
            mic_packet("D", 11_000_000, 8.0, 80),
            mic_packet("D", 21_000_000, 8.0, 80),
            mic_packet("D", 31_000_000, 8.0, 80),
        ];
        let gaps = identify_time_gaps(&packets, 5.0);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].index, 2);
    }

    #[test]
    fn test_gap_exactly_at_limit_is_quiet() {
        // diff == packet length + tolerance must not trigger
        let packets = vec![
            mic_packet("D", 0, 80.0, 80),
            mic_packet("D", 6_000_000, 80.0, 80), // 6 s = 1 s length + 5 s tolerance
        ];
        assert!(identify_time_gaps(&packets, 5.0).is_empty());
    }

    #[test]
    fn test_sensor_change_on_added_sensor() {
        let packets = vec![
            mic_packet("D", 0, 80.0, 80),
            with_barometer(mic_packet("D", 1_000_000, 80.0, 80)),
            with_barometer(mic_packet("D", 2_000_000, 80.0, 80)),
        ];
        assert_eq!(identify_sensor_changes(&packets), vec![1]);
    }

    #[test]
    fn test_sensor_change_on_rate_change() {
        let packets = vec![
            mic_packet("D", 0, 80.0, 80),
            mic_packet("D", 1_000_000, 800.0, 80),
        ];
        assert_eq!(identify_sensor_changes(&packets), vec![1]);
    }

    #[test]
    fn test_stable_configuration_has_no_changes() {
        let packets = vec![
            with_barometer(mic_packet("D", 0, 80.0, 80)),
            with_barometer(mic_packet("D", 1_000_000, 80.0, 80)),
        ];
        assert!(identify_sensor_changes(&packets).is_empty());
    }
}
