//! Packet concatenation
//!
//! Merges contiguous runs of packets from one device into single logical
//! packets. Interleaved payloads are never concatenated raw: every component
//! is deinterleaved across the run, concatenated in packet order, and
//! re-interleaved in the channel_types order of the run's first packet.

use contracts::{
    Channel, ChannelPayload, ContinuityConfig, EvenlySampledChannel, Packet,
    UnevenlySampledChannel,
};
use observability::RunningStats;
use tracing::{debug, instrument};

use crate::detector::{identify_sensor_changes, identify_time_gaps};
use crate::error::{ConcatenationError, Result};

/// Merges contiguous packet runs into single logical packets.
///
/// Inputs are read-only; merged packets are newly built. Callers sort by
/// timestamp first; out-of-order input is an error, not a sort request.
#[derive(Debug, Clone, Default)]
pub struct PacketConcatenator {
    config: ContinuityConfig,
}

impl PacketConcatenator {
    /// Create a concatenator with the given continuity configuration.
    pub fn new(config: ContinuityConfig) -> Self {
        Self { config }
    }

    /// Concatenate an ordered packet list into one merged packet per
    /// contiguous run.
    ///
    /// Partition points come from time-gap and sensor-change detection; a
    /// fully continuous input yields exactly one merged packet.
    #[instrument(name = "concat_packets", skip(self, packets), fields(packets = packets.len()))]
    pub fn concat(&self, packets: &[Packet]) -> Result<Vec<Packet>> {
        if packets.is_empty() {
            return Ok(Vec::new());
        }
        self.check_identity(packets)?;
        self.check_monotonic(packets)?;

        let mut partitions: Vec<usize> = identify_time_gaps(packets, self.config.allowed_timing_error_s)
            .into_iter()
            .map(|gap| gap.index)
            .chain(identify_sensor_changes(packets))
            .collect();
        partitions.sort_unstable();
        partitions.dedup();

        let mut merged = Vec::with_capacity(partitions.len() + 1);
        let mut run_start = 0usize;
        for boundary in partitions.into_iter().chain([packets.len()]) {
            if boundary > run_start {
                let run = &packets[run_start..boundary];
                merged.push(merge_run(run)?);
                observability::record_packets_merged(
                    packets[run_start].device_id.as_str(),
                    run.len(),
                );
            }
            run_start = boundary;
        }

        debug!(runs = merged.len(), "concatenation complete");
        Ok(merged)
    }

    /// All packets must come from one device install.
    fn check_identity(&self, packets: &[Packet]) -> Result<()> {
        let first = &packets[0];
        for (index, packet) in packets.iter().enumerate().skip(1) {
            if packet.device_id != first.device_id || packet.uuid != first.uuid {
                return Err(ConcatenationError::MixedDeviceIdentity {
                    expected: format!("{}:{}", first.device_id, first.uuid),
                    actual: format!("{}:{}", packet.device_id, packet.uuid),
                    packet_index: index,
                });
            }
        }
        Ok(())
    }

    /// Machine start timestamps must be strictly increasing.
    fn check_monotonic(&self, packets: &[Packet]) -> Result<()> {
        for (index, pair) in packets.windows(2).enumerate() {
            if pair[1].app_start_mach_us <= pair[0].app_start_mach_us {
                return Err(ConcatenationError::NonMonotonicOrder {
                    packet_index: index + 1,
                    prev_us: pair[0].app_start_mach_us,
                    curr_us: pair[1].app_start_mach_us,
                });
            }
        }
        Ok(())
    }
}

/// Merge one contiguous run into a single packet.
fn merge_run(run: &[Packet]) -> Result<Packet> {
    let first = &run[0];
    if run.len() == 1 {
        return Ok(first.clone());
    }

    let mut merged = first.clone();

    // Packet metadata concatenates in order, duplicates retained
    merged.metadata = run.iter().flat_map(|p| p.metadata.iter().cloned()).collect();

    for (channel_index, channel) in first.evenly_sampled.iter().enumerate() {
        let bodies = collect_channel_bodies(run, channel_index, &channel.channel, |p, i| {
            p.evenly_sampled.get(i).map(|ch| &ch.channel)
        })?;
        merged.evenly_sampled[channel_index] = EvenlySampledChannel {
            channel: merge_channel_bodies(&channel.channel, &bodies)?,
            sample_rate_hz: channel.sample_rate_hz,
            first_sample_timestamp_us: channel.first_sample_timestamp_us,
        };
    }

    for (channel_index, channel) in first.unevenly_sampled.iter().enumerate() {
        let bodies = collect_channel_bodies(run, channel_index, &channel.channel, |p, i| {
            p.unevenly_sampled.get(i).map(|ch| &ch.channel)
        })?;

        // Timestamps concatenate directly; monotonic by construction of the
        // run
        let timestamps_us: Vec<i64> = run
            .iter()
            .flat_map(|p| p.unevenly_sampled[channel_index].timestamps_us.iter().copied())
            .collect();
        let (mean, std, median) = interval_statistics(&timestamps_us);

        merged.unevenly_sampled[channel_index] = UnevenlySampledChannel {
            channel: merge_channel_bodies(&channel.channel, &bodies)?,
            timestamps_us,
            sample_interval_mean_us: mean,
            sample_interval_std_us: std,
            sample_interval_median_us: median,
        };
    }

    merged.rebuild_index();
    Ok(merged)
}

/// Collect the run's bodies for one channel position, checking the layout
/// stays identical across the run.
fn collect_channel_bodies<'a, F>(
    run: &'a [Packet],
    channel_index: usize,
    first: &Channel,
    pick: F,
) -> Result<Vec<&'a Channel>>
where
    F: Fn(&'a Packet, usize) -> Option<&'a Channel>,
{
    let mut bodies = Vec::with_capacity(run.len());
    for (packet_index, packet) in run.iter().enumerate() {
        let body = pick(packet, channel_index).filter(|ch| {
            ch.channel_types == first.channel_types && ch.sensor_name == first.sensor_name
        });
        match body {
            Some(body) => bodies.push(body),
            None => {
                return Err(ConcatenationError::ChannelLayoutMismatch {
                    sensor_name: first.sensor_name.clone(),
                    packet_index,
                })
            }
        }
    }
    Ok(bodies)
}

/// Merge channel bodies: per-component deinterleave, concat, re-interleave.
fn merge_channel_bodies(first: &Channel, bodies: &[&Channel]) -> Result<Channel> {
    let payload = if first.channel_types.len() <= 1 {
        // Single component: plain concatenation is already correct
        let parts: Vec<&ChannelPayload> = bodies.iter().map(|ch| &ch.payload).collect();
        ChannelPayload::concat(&parts)?
    } else {
        let mut components = Vec::with_capacity(first.channel_types.len());
        for component in &first.channel_types {
            let parts: Vec<ChannelPayload> = bodies
                .iter()
                .map(|ch| ch.native_payload_for(*component))
                .collect::<std::result::Result<_, _>>()?;
            let refs: Vec<&ChannelPayload> = parts.iter().collect();
            components.push(ChannelPayload::concat(&refs)?);
        }
        ChannelPayload::interleave(&components)?
    };

    let (value_means, value_stds, value_medians) = component_statistics(first, &payload);

    Ok(Channel {
        sensor_name: first.sensor_name.clone(),
        channel_types: first.channel_types.clone(),
        payload,
        metadata: bodies.iter().flat_map(|ch| ch.metadata.iter().cloned()).collect(),
        value_means,
        value_stds,
        value_medians,
    })
}

/// Recompute aligned per-component statistics over a merged payload.
fn component_statistics(first: &Channel, payload: &ChannelPayload) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let stride = first.channel_types.len();
    let values = payload.as_f64();
    if stride == 0 || values.is_empty() {
        return (Vec::new(), Vec::new(), Vec::new());
    }

    let mut means = Vec::with_capacity(stride);
    let mut stds = Vec::with_capacity(stride);
    let mut medians = Vec::with_capacity(stride);
    for offset in 0..stride {
        let component: Vec<f64> = values.iter().skip(offset).step_by(stride).copied().collect();
        let mut stats = RunningStats::default();
        component.iter().for_each(|v| stats.push(*v));
        means.push(stats.mean());
        stds.push(stats.std_dev());
        medians.push(median(component));
    }
    (means, stds, medians)
}

/// Inter-sample interval statistics over a merged timestamp array.
fn interval_statistics(timestamps_us: &[i64]) -> (f64, f64, f64) {
    if timestamps_us.len() < 2 {
        return (0.0, 0.0, 0.0);
    }
    let intervals: Vec<f64> = timestamps_us
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64)
        .collect();
    let mut stats = RunningStats::default();
    intervals.iter().for_each(|v| stats.push(*v));
    (stats.mean(), stats.std_dev(), median(intervals))
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        0.5 * (values[mid - 1] + values[mid])
    }
}
