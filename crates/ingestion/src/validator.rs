//! Packet validation
//!
//! Validation rules:
//! - payload length divides evenly into the component stride
//! - numeric channels carry a numeric payload variant
//! - statistics arrays align 1:1 with the component list when present
//! - unevenly-sampled timestamps are strictly ascending
//! - tri-message payloads hold whole exchanges (multiples of 6)
//!
//! Findings are reported, never repaired: a decoded packet is evidence, and
//! rewriting it would hide the device fault being diagnosed.

use contracts::{Channel, ChannelType, Packet, PayloadTag, UnevenlySampledChannel};

/// One validation finding on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFinding {
    /// Sensor the finding applies to
    pub sensor_name: String,
    /// Human-readable description
    pub message: String,
}

impl ValidationFinding {
    fn new(sensor_name: &str, message: impl Into<String>) -> Self {
        Self {
            sensor_name: sensor_name.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.sensor_name, self.message)
    }
}

/// Validate one decoded packet, returning every finding.
///
/// An empty vector means the packet is well-formed.
pub fn validate_packet(packet: &Packet) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    for ch in &packet.evenly_sampled {
        check_channel_body(&ch.channel, &mut findings);
        if ch.sample_rate_hz <= 0.0 {
            findings.push(ValidationFinding::new(
                &ch.channel.sensor_name,
                format!("sample_rate_hz must be > 0, got {}", ch.sample_rate_hz),
            ));
        }
    }

    for ch in &packet.unevenly_sampled {
        check_channel_body(&ch.channel, &mut findings);
        check_timestamps(ch, &mut findings);
        check_tri_message(ch, &mut findings);
    }

    findings
}

fn check_channel_body(channel: &Channel, findings: &mut Vec<ValidationFinding>) {
    let stride = channel.channel_types.len();
    let len = channel.payload.len();

    if stride == 0 && len > 0 {
        findings.push(ValidationFinding::new(
            &channel.sensor_name,
            "payload present but channel_types is empty",
        ));
        return;
    }
    if stride > 0 && len % stride != 0 {
        findings.push(ValidationFinding::new(
            &channel.sensor_name,
            format!("payload length {len} not divisible by {stride} components"),
        ));
    }

    // Numeric getters on a bytes payload silently yield nothing; flag the
    // shape here where malformed data is the question being asked.
    if channel.payload.tag() == PayloadTag::Bytes
        && !channel.channel_types.iter().all(|ct| *ct == ChannelType::Other)
    {
        findings.push(ValidationFinding::new(
            &channel.sensor_name,
            "bytes payload on a numeric channel",
        ));
    }

    for (which, stats) in [
        ("value_means", &channel.value_means),
        ("value_stds", &channel.value_stds),
        ("value_medians", &channel.value_medians),
    ] {
        if !stats.is_empty() && stats.len() != stride {
            findings.push(ValidationFinding::new(
                &channel.sensor_name,
                format!(
                    "{which} has {} entries for {stride} components",
                    stats.len()
                ),
            ));
        }
    }
}

fn check_timestamps(ch: &UnevenlySampledChannel, findings: &mut Vec<ValidationFinding>) {
    let samples = ch.channel.sample_count();
    if !ch.timestamps_us.is_empty() && ch.timestamps_us.len() != samples {
        findings.push(ValidationFinding::new(
            &ch.channel.sensor_name,
            format!(
                "{} timestamps for {samples} samples",
                ch.timestamps_us.len()
            ),
        ));
    }
    for pair in ch.timestamps_us.windows(2) {
        if pair[1] <= pair[0] {
            findings.push(ValidationFinding::new(
                &ch.channel.sensor_name,
                format!(
                    "timestamps not strictly ascending: {} followed by {}",
                    pair[0], pair[1]
                ),
            ));
            break;
        }
    }
}

fn check_tri_message(ch: &UnevenlySampledChannel, findings: &mut Vec<ValidationFinding>) {
    if !ch.channel.has_component(ChannelType::TimeSynchronization) {
        return;
    }
    let len = ch.channel.payload.len();
    if len % 6 != 0 {
        findings.push(ValidationFinding::new(
            &ch.channel.sensor_name,
            format!("tri-message payload length {len} is not a multiple of 6"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Channel, ChannelPayload, EvenlySampledChannel};

    fn uneven(
        name: &str,
        types: Vec<ChannelType>,
        payload: ChannelPayload,
        timestamps: Vec<i64>,
    ) -> UnevenlySampledChannel {
        UnevenlySampledChannel {
            channel: Channel {
                sensor_name: name.to_string(),
                channel_types: types,
                payload,
                metadata: vec![],
                value_means: vec![],
                value_stds: vec![],
                value_medians: vec![],
            },
            timestamps_us: timestamps,
            sample_interval_mean_us: 0.0,
            sample_interval_std_us: 0.0,
            sample_interval_median_us: 0.0,
        }
    }

    #[test]
    fn test_well_formed_packet_has_no_findings() {
        let packet = Packet {
            evenly_sampled: vec![EvenlySampledChannel {
                channel: Channel {
                    sensor_name: "mic".to_string(),
                    channel_types: vec![ChannelType::Microphone],
                    payload: ChannelPayload::I32(vec![0; 80]),
                    metadata: vec![],
                    value_means: vec![0.0],
                    value_stds: vec![0.0],
                    value_medians: vec![0.0],
                },
                sample_rate_hz: 80.0,
                first_sample_timestamp_us: 0,
            }],
            ..Default::default()
        }
        .indexed();
        assert!(validate_packet(&packet).is_empty());
    }

    #[test]
    fn test_non_divisible_payload_reported() {
        let packet = Packet {
            unevenly_sampled: vec![uneven(
                "gps",
                vec![ChannelType::Latitude, ChannelType::Longitude],
                ChannelPayload::F64(vec![1.0, 2.0, 3.0]),
                vec![0],
            )],
            ..Default::default()
        }
        .indexed();
        let findings = validate_packet(&packet);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("not divisible"));
    }

    #[test]
    fn test_descending_timestamps_reported_not_repaired() {
        let packet = Packet {
            unevenly_sampled: vec![uneven(
                "baro",
                vec![ChannelType::Barometer],
                ChannelPayload::F64(vec![1.0, 2.0, 3.0]),
                vec![0, 2_000_000, 1_000_000],
            )],
            ..Default::default()
        }
        .indexed();
        let findings = validate_packet(&packet);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("strictly ascending"));
        // The packet itself is untouched
        assert_eq!(
            packet.unevenly_sampled[0].timestamps_us,
            vec![0, 2_000_000, 1_000_000]
        );
    }

    #[test]
    fn test_partial_tri_message_reported() {
        let packet = Packet {
            unevenly_sampled: vec![uneven(
                "time sync",
                vec![ChannelType::TimeSynchronization],
                ChannelPayload::I64(vec![1, 2, 3, 4, 5, 6, 7]),
                vec![],
            )],
            ..Default::default()
        }
        .indexed();
        let findings = validate_packet(&packet);
        assert!(findings
            .iter()
            .any(|f| f.message.contains("multiple of 6")));
    }

    #[test]
    fn test_bytes_payload_on_numeric_channel_reported() {
        let packet = Packet {
            unevenly_sampled: vec![uneven(
                "baro",
                vec![ChannelType::Barometer],
                ChannelPayload::Bytes(bytes::Bytes::from_static(b"xx")),
                vec![0, 1],
            )],
            ..Default::default()
        }
        .indexed();
        let findings = validate_packet(&packet);
        assert!(findings
            .iter()
            .any(|f| f.message.contains("bytes payload")));
    }
}
