//! Time-sync engine
//!
//! Aggregates tri-message statistics across an ordered packet list from one
//! device, resolves one list-wide best latency/offset pair, and rebaselines
//! every timestamp-bearing field. The list must be one continuous recording
//! session: the engine validates configuration stability and refuses drifted
//! lists rather than segmenting them itself.

use std::collections::BTreeSet;

use contracts::Packet;
use observability::RunningStats;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SyncError};
use crate::tri_message::{TriMessageStats, EXCHANGE_STRIDE};

/// Resolved time-sync state for one ordered packet list.
#[derive(Debug, Clone, Default)]
pub struct TimeSyncAnalysis {
    /// Audio sample rate shared by every packet (Hz)
    pub sample_rate_hz: f64,

    /// Device monotonic epoch shared by every packet (µs)
    pub mach_time_zero: i64,

    /// Number of packets analyzed
    pub packet_count: usize,

    /// Per-packet winning latency (µs); emptied when no packet is valid
    pub latencies: Vec<f64>,

    /// Per-packet winning offset (µs); emptied when no packet is valid
    pub offsets: Vec<f64>,

    /// Per-packet revised start time: microphone first-sample timestamp
    /// shifted by the global best offset (µs)
    pub revised_start_times_us: Vec<i64>,

    /// Packets whose latency was <= 0 after clamping; kept at their original
    /// index for downstream alignment
    pub bad_packets: BTreeSet<usize>,

    /// List-wide best latency (µs); None when no exchange is valid
    pub best_latency: Option<f64>,

    /// Offset paired with the best latency (µs); 0.0 for the identity
    /// correction
    pub best_offset: f64,

    /// Index of the packet the best pair came from
    pub best_index: Option<usize>,

    /// Pooled latency statistics across all exchanges of all packets
    pub latency_stats: RunningStats,

    /// Pooled offset statistics across all exchanges of all packets
    pub offset_stats: RunningStats,
}

/// Batch time-sync engine over ordered packet lists.
///
/// Stateless; each call analyzes one list. Callers sort packets by timestamp
/// beforehand; the engine never reorders its input.
pub struct TimeSyncEngine;

impl TimeSyncEngine {
    /// Analyze one ordered packet list.
    ///
    /// Validates configuration stability, extracts per-packet tri-message
    /// statistics, and resolves the list-wide best latency/offset.
    #[instrument(name = "time_sync_analyze", skip(packets), fields(packets = packets.len()))]
    pub fn analyze(packets: &[Packet]) -> Result<TimeSyncAnalysis> {
        let mut analysis = TimeSyncAnalysis::default();
        let first = match packets.first() {
            Some(first) => first,
            None => return Ok(analysis),
        };

        let reference = first
            .microphone()
            .ok_or(SyncError::MissingReferenceChannel { packet_index: 0 })?;
        analysis.sample_rate_hz = reference.sample_rate_hz;
        analysis.mach_time_zero = first.mach_time_zero;
        analysis.packet_count = packets.len();

        Self::validate_configuration(packets, analysis.sample_rate_hz, analysis.mach_time_zero)?;

        for (index, packet) in packets.iter().enumerate() {
            let (latency, offset) = Self::packet_exchange_stats(packet, &mut analysis)?;
            if latency <= 0.0 {
                analysis.bad_packets.insert(index);
            }
            analysis.latencies.push(latency);
            analysis.offsets.push(offset);
        }

        Self::resolve_best(&mut analysis);

        // Revised start times shift every packet by the single list-wide
        // offset, not each packet's own estimate.
        for (index, packet) in packets.iter().enumerate() {
            let start = packet
                .microphone()
                .ok_or(SyncError::MissingReferenceChannel { packet_index: index })?
                .first_sample_timestamp_us;
            analysis
                .revised_start_times_us
                .push(shift_timestamp(start, analysis.best_offset));
        }

        observability::record_sync_resolution(
            first.device_id.as_str(),
            analysis.best_latency,
            analysis.best_offset,
        );
        debug!(
            best_latency = ?analysis.best_latency,
            best_offset = analysis.best_offset,
            bad_packets = analysis.bad_packets.len(),
            "time sync resolved"
        );
        Ok(analysis)
    }

    /// Reject lists whose sensor configuration drifts mid-session.
    fn validate_configuration(
        packets: &[Packet],
        sample_rate_hz: f64,
        mach_time_zero: i64,
    ) -> Result<()> {
        for (index, packet) in packets.iter().enumerate() {
            let mic = packet
                .microphone()
                .ok_or(SyncError::MissingReferenceChannel { packet_index: index })?;
            if mic.sample_rate_hz != sample_rate_hz {
                return Err(SyncError::SampleRateMismatch {
                    packet_index: index,
                    expected: sample_rate_hz,
                    actual: mic.sample_rate_hz,
                });
            }
            if packet.mach_time_zero != mach_time_zero {
                return Err(SyncError::MachTimeZeroMismatch {
                    packet_index: index,
                    expected: mach_time_zero,
                    actual: packet.mach_time_zero,
                });
            }
        }
        Ok(())
    }

    /// Winning (latency, offset) of one packet; (0.0, 0.0) without usable
    /// exchanges. Pools the packet's exchange statistics into the analysis.
    fn packet_exchange_stats(
        packet: &Packet,
        analysis: &mut TimeSyncAnalysis,
    ) -> Result<(f64, f64)> {
        let flat = match packet.tri_message_payload()? {
            Some(flat) if !flat.is_empty() && flat.len() % EXCHANGE_STRIDE == 0 => flat,
            Some(flat) => {
                warn!(
                    device_id = %packet.device_id,
                    payload_len = flat.len(),
                    "tri-message payload is not a positive multiple of 6; ignoring"
                );
                return Ok((0.0, 0.0));
            }
            None => return Ok((0.0, 0.0)),
        };

        let stats = TriMessageStats::from_flat(flat);
        analysis.latency_stats.merge(&stats.latency_stats());
        analysis.offset_stats.merge(&stats.offset_stats());

        match stats.best_latency {
            Some(latency) => Ok((latency, stats.best_offset)),
            None => Ok((0.0, 0.0)),
        }
    }

    /// Pick the list-wide best latency and its paired offset.
    fn resolve_best(analysis: &mut TimeSyncAnalysis) {
        let best = analysis
            .latencies
            .iter()
            .enumerate()
            .filter(|(index, d)| **d > 0.0 && !analysis.bad_packets.contains(index))
            .min_by(|(_, x), (_, y)| x.total_cmp(y));

        match best {
            Some((index, latency)) => {
                analysis.best_latency = Some(*latency);
                analysis.best_offset = analysis.offsets[index];
                analysis.best_index = Some(index);
            }
            None => {
                // No usable exchange anywhere: identity correction, and the
                // valid latency/offset sets are emptied.
                analysis.latencies.clear();
                analysis.offsets.clear();
                analysis.best_latency = None;
                analysis.best_offset = 0.0;
                analysis.best_index = None;
            }
        }
    }

    /// Apply the resolved global offset to every timestamp-bearing field.
    ///
    /// Shifts app start (epoch and machine clocks), mach time zero, the
    /// microphone first-sample timestamp, and every unevenly-sampled
    /// timestamp array; marks packets corrected. Not idempotent: applying
    /// twice double-shifts, and guarding against that is the caller's
    /// contract.
    #[instrument(name = "sync_packet_time", skip(packets, analysis), fields(packets = packets.len()))]
    pub fn sync_packet_time(packets: &mut [Packet], analysis: &TimeSyncAnalysis) {
        let offset = analysis.best_offset;
        for packet in packets.iter_mut() {
            packet.app_start_epoch_us = shift_timestamp(packet.app_start_epoch_us, offset);
            packet.app_start_mach_us = shift_timestamp(packet.app_start_mach_us, offset);
            packet.mach_time_zero = shift_timestamp(packet.mach_time_zero, offset);

            if let Some(mic) = packet.microphone_mut() {
                mic.first_sample_timestamp_us =
                    shift_timestamp(mic.first_sample_timestamp_us, offset);
            }
            for channel in &mut packet.unevenly_sampled {
                for ts in &mut channel.timestamps_us {
                    *ts = shift_timestamp(*ts, offset);
                }
            }

            packet.best_latency = analysis.best_latency;
            packet.best_offset = offset;
            packet.is_synch_corrected = true;
        }
        metrics::counter!("fieldsync_packets_corrected_total")
            .increment(packets.len() as u64);
    }
}

impl TimeSyncAnalysis {
    /// Reconstruct the corrected, evenly spaced timestamp sequence covering
    /// the whole list (µs).
    ///
    /// Anchored at the best-latency packet's corrected start time:
    /// `best_index * samples_per_file` samples run backward at the fixed
    /// sample interval, the anchor and
    /// `(packet_count - best_index) * samples_per_file - 1` samples run
    /// forward, concatenated in chronological order.
    pub fn corrected_time_array(&self, samples_per_file: usize) -> Vec<f64> {
        if self.packet_count == 0 || samples_per_file == 0 || self.sample_rate_hz <= 0.0 {
            return Vec::new();
        }
        let index = self.best_index.unwrap_or(0);
        let anchor = self.revised_start_times_us[index] as f64;
        let interval_us = 1e6 / self.sample_rate_hz;

        let backward = index * samples_per_file;
        let forward = (self.packet_count - index) * samples_per_file - 1;

        let mut times = Vec::with_capacity(backward + 1 + forward);
        for k in (1..=backward).rev() {
            times.push(anchor - k as f64 * interval_us);
        }
        times.push(anchor);
        for j in 1..=forward {
            times.push(anchor + j as f64 * interval_us);
        }
        times
    }
}

/// Add a float offset to an integer microsecond timestamp, rounding to the
/// nearest microsecond.
fn shift_timestamp(timestamp_us: i64, offset_us: f64) -> i64 {
    (timestamp_us as f64 + offset_us).round() as i64
}
