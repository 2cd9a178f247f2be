//! # Integration Tests
//!
//! End-to-end tests over the whole pipeline: envelope encode -> pool decode
//! -> time sync -> continuity -> concatenation. No hardware or network
//! involved; fixtures are built in memory through the producer-side codec.

#[cfg(test)]
mod fixtures {
    use bytes::Bytes;
    use contracts::{
        Channel, ChannelPayload, ChannelType, EvenlySampledChannel, Packet,
        UnevenlySampledChannel,
    };
    use ingestion::{encode_packet, PacketEntry};

    /// One audio packet: `samples` microphone samples at `rate` Hz.
    pub fn audio_packet(device: &str, start_us: i64, rate: f64, samples: usize) -> Packet {
        Packet {
            device_id: device.into(),
            uuid: "install-1".to_string(),
            auth_email: "ops@example.com".to_string(),
            auth_token: "token".to_string(),
            metadata: vec![("start".to_string(), format!("{start_us}"))],
            app_start_epoch_us: 1_500_000_000_000_000 + start_us,
            app_start_mach_us: start_us,
            mach_time_zero: 0,
            evenly_sampled: vec![EvenlySampledChannel {
                channel: Channel {
                    sensor_name: "internal mic".to_string(),
                    channel_types: vec![ChannelType::Microphone],
                    payload: ChannelPayload::I32(vec![3; samples]),
                    metadata: vec![],
                    value_means: vec![3.0],
                    value_stds: vec![0.0],
                    value_medians: vec![3.0],
                },
                sample_rate_hz: rate,
                first_sample_timestamp_us: start_us,
            }],
            unevenly_sampled: vec![],
            best_latency: None,
            best_offset: 0.0,
            is_synch_corrected: false,
            ..Default::default()
        }
        .indexed()
    }

    /// Attach a location channel (lat/lon/alt interleaved) with one sample.
    pub fn with_location(mut packet: Packet, altitude: f64) -> Packet {
        let start = packet.app_start_mach_us;
        packet.unevenly_sampled.push(UnevenlySampledChannel {
            channel: Channel {
                sensor_name: "gps".to_string(),
                channel_types: vec![
                    ChannelType::Latitude,
                    ChannelType::Longitude,
                    ChannelType::Altitude,
                ],
                payload: ChannelPayload::F64(vec![19.7, -155.0, altitude]),
                metadata: vec![],
                value_means: vec![19.7, -155.0, altitude],
                value_stds: vec![0.0, 0.0, 0.0],
                value_medians: vec![19.7, -155.0, altitude],
            },
            timestamps_us: vec![start],
            sample_interval_mean_us: 0.0,
            sample_interval_std_us: 0.0,
            sample_interval_median_us: 0.0,
        });
        packet.rebuild_index();
        packet
    }

    /// Attach one tri-message exchange with clock offset `delta` µs and
    /// one-way latency `epsilon` µs.
    pub fn with_exchange(mut packet: Packet, delta: i64, epsilon: i64) -> Packet {
        let a1 = packet.app_start_mach_us + 500_000;
        let b1 = a1 + epsilon - delta;
        let b2 = b1 + 10_000;
        let a2 = b2 + delta + epsilon;
        let a3 = a2 + 5_000;
        let b3 = a3 + epsilon - delta;
        packet.unevenly_sampled.push(UnevenlySampledChannel {
            channel: Channel {
                sensor_name: "time sync".to_string(),
                channel_types: vec![ChannelType::TimeSynchronization],
                payload: ChannelPayload::I64(vec![a1, a2, a3, b1, b2, b3]),
                metadata: vec![],
                value_means: vec![],
                value_stds: vec![],
                value_medians: vec![],
            },
            timestamps_us: vec![a1],
            sample_interval_mean_us: 0.0,
            sample_interval_std_us: 0.0,
            sample_interval_median_us: 0.0,
        });
        packet.rebuild_index();
        packet
    }

    /// Serialize packets into raw source entries, as the indexing
    /// collaborator would hand them over.
    pub fn entries_for(packets: &[Packet]) -> Vec<PacketEntry> {
        packets
            .iter()
            .map(|p| PacketEntry {
                device_id: p.device_id.clone(),
                timestamp_us: p.app_start_mach_us,
                data: Bytes::from(encode_packet(p).unwrap()),
            })
            .collect()
    }
}

#[cfg(test)]
mod e2e_tests {
    use super::fixtures::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ChannelType, Packet};
    use continuity::{identify_sensor_changes, identify_time_gaps, PacketConcatenator};
    use ingestion::{decode_entries, validate_packet};
    use observability::PipelineMetricsAggregator;
    use sync_engine::TimeSyncEngine;

    /// Decode raw entries through the worker pool, failing the test on any
    /// per-file error.
    async fn decode_ok(packets: &[Packet]) -> Vec<Packet> {
        let config = contracts::DecodeConfig::default();
        decode_entries(entries_for(packets), config)
            .await
            .into_iter()
            .map(|outcome| outcome.result.expect("fixture must decode"))
            .collect()
    }

    /// Three back-to-back packets: decode, sync, detect, concatenate into
    /// exactly one logical packet.
    #[tokio::test]
    async fn test_e2e_continuous_session() {
        let originals = vec![
            with_location(with_exchange(audio_packet("D", 0, 80.0, 80), 2_000, 400), 10.0),
            with_location(
                with_exchange(audio_packet("D", 1_000_000, 80.0, 80), 2_000, 250),
                11.0,
            ),
            with_location(
                with_exchange(audio_packet("D", 2_000_000, 80.0, 80), 2_000, 900),
                12.0,
            ),
        ];

        let mut aggregator = PipelineMetricsAggregator::new();
        let mut packets = decode_ok(&originals).await;
        assert_eq!(packets.len(), 3);
        for packet in &packets {
            assert!(validate_packet(packet).is_empty());
            aggregator.record_decode(true);
        }

        // Time sync: packet 1 carries the smallest latency
        let analysis = TimeSyncEngine::analyze(&packets).unwrap();
        assert_eq!(analysis.best_index, Some(1));
        assert_eq!(analysis.best_latency, Some(250.0));
        assert!((analysis.best_offset - 2_000.0).abs() < 1e-9);

        TimeSyncEngine::sync_packet_time(&mut packets, &analysis);
        assert!(packets.iter().all(|p| p.is_synch_corrected));
        aggregator.record_sync(analysis.best_latency, analysis.best_offset);

        // Continuity: back-to-back starts, stable configuration
        let gaps = identify_time_gaps(&packets, 5.0);
        let changes = identify_sensor_changes(&packets);
        assert!(gaps.is_empty());
        assert!(changes.is_empty());
        aggregator.record_continuity(gaps.len(), changes.len());

        let merged = PacketConcatenator::new(contracts::ContinuityConfig::default())
            .concat(&packets)
            .unwrap();
        assert_eq!(merged.len(), 1);
        aggregator.record_merge(merged.len());

        let summary = aggregator.summary();
        assert_eq!(summary.packets_decoded, 3);
        assert_eq!(summary.time_gaps, 0);
        assert_eq!(summary.merged_packets, 1);
        assert_eq!(summary.latency_us.count, 1);

        let packet = &merged[0];
        assert_eq!(packet.microphone().unwrap().channel.payload.len(), 240);

        // Location components stay co-indexed through the merge
        let gps = packet.channel(ChannelType::Latitude).unwrap().channel();
        let lat = gps.payload_for(ChannelType::Latitude).unwrap();
        let alt = gps.payload_for(ChannelType::Altitude).unwrap();
        assert_eq!(lat, vec![19.7, 19.7, 19.7]);
        assert_eq!(alt, vec![10.0, 11.0, 12.0]);

        // Per-sample timestamps carry the applied offset
        let location = packet.unevenly(ChannelType::Latitude).unwrap();
        assert_eq!(
            location.timestamps_us,
            vec![2_000, 1_002_000, 2_002_000]
        );
    }

    /// Moving the third packet's start to t=10 s opens exactly one gap at
    /// index 2 and splits the output into two logical packets.
    #[tokio::test]
    async fn test_e2e_gap_splits_session() {
        let originals = vec![
            audio_packet("D", 0, 80.0, 80),
            audio_packet("D", 1_000_000, 80.0, 80),
            audio_packet("D", 10_000_000, 80.0, 80),
        ];
        let packets = decode_ok(&originals).await;

        let gaps = identify_time_gaps(&packets, 5.0);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].index, 2);

        let merged = PacketConcatenator::new(contracts::ContinuityConfig::default())
            .concat(&packets)
            .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].microphone().unwrap().channel.payload.len(), 160);
        assert_eq!(merged[1].microphone().unwrap().channel.payload.len(), 80);
    }

    /// A single packet without exchanges resolves to the identity
    /// correction end to end.
    #[tokio::test]
    async fn test_e2e_single_packet_identity() {
        let mut packets = decode_ok(&[audio_packet("D", 0, 80.0, 80)]).await;

        let analysis = TimeSyncEngine::analyze(&packets).unwrap();
        assert_eq!(analysis.best_latency, None);
        assert_eq!(analysis.best_offset, 0.0);

        TimeSyncEngine::sync_packet_time(&mut packets, &analysis);
        assert!(packets[0].is_synch_corrected);
        assert_eq!(packets[0].app_start_mach_us, 0);
        assert_eq!(
            packets[0].microphone().unwrap().first_sample_timestamp_us,
            0
        );
    }

    /// Mixed devices and out-of-order input are rejected by concatenation.
    #[tokio::test]
    async fn test_e2e_concat_rejections() {
        let concatenator = PacketConcatenator::new(contracts::ContinuityConfig::default());

        let mixed = decode_ok(&[
            audio_packet("D", 0, 80.0, 80),
            audio_packet("E", 1_000_000, 80.0, 80),
        ])
        .await;
        assert!(concatenator.concat(&mixed).is_err());

        let out_of_order = decode_ok(&[
            audio_packet("D", 1_000_000, 80.0, 80),
            audio_packet("D", 0, 80.0, 80),
        ])
        .await;
        assert!(concatenator.concat(&out_of_order).is_err());
    }

    /// Sample-rate drift inside a session is fatal for the sync engine; the
    /// caller segments by configuration and retries per segment.
    #[tokio::test]
    async fn test_e2e_config_drift_requires_segmentation() {
        let packets = decode_ok(&[
            audio_packet("D", 0, 80.0, 80),
            audio_packet("D", 1_000_000, 800.0, 800),
        ])
        .await;

        assert!(TimeSyncEngine::analyze(&packets).is_err());

        // Each configuration segment analyzes cleanly on its own
        assert!(TimeSyncEngine::analyze(&packets[..1]).is_ok());
        assert!(TimeSyncEngine::analyze(&packets[1..]).is_ok());
    }

    /// The corrected time array spans every packet at the fixed interval.
    #[tokio::test]
    async fn test_e2e_corrected_time_array() {
        let originals = vec![
            audio_packet("D", 0, 80.0, 80),
            with_exchange(audio_packet("D", 1_000_000, 80.0, 80), 1_500, 300),
            audio_packet("D", 2_000_000, 80.0, 80),
        ];
        let packets = decode_ok(&originals).await;
        let analysis = TimeSyncEngine::analyze(&packets).unwrap();

        let times = analysis.corrected_time_array(80);
        assert_eq!(times.len(), 240);

        let interval = 1e6 / 80.0;
        let anchor = 1_001_500.0; // best packet start + offset
        assert!((times[80] - anchor).abs() < 1e-9);
        assert!((times[0] - (anchor - 80.0 * interval)).abs() < 1e-9);
        for pair in times.windows(2) {
            assert!((pair[1] - pair[0] - interval).abs() < 1e-9);
        }
    }

    /// Configuration drives the pipeline stages end to end.
    #[tokio::test]
    async fn test_e2e_configured_pipeline() {
        let config = ConfigLoader::load_from_str(
            r#"
[decode]
workers = 2
channel_capacity = 8

[continuity]
allowed_timing_error_s = 0.5
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let originals = vec![
            audio_packet("D", 0, 80.0, 80),
            audio_packet("D", 3_000_000, 80.0, 80), // 3 s jump > 1 s + 0.5 s
        ];
        let outcomes = ingestion::decode_entries(entries_for(&originals), config.decode).await;
        let packets: Vec<_> = outcomes
            .into_iter()
            .map(|o| o.result.unwrap())
            .collect();

        let merged = PacketConcatenator::new(config.continuity)
            .concat(&packets)
            .unwrap();
        assert_eq!(merged.len(), 2);
    }
}
