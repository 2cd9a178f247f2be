//! Pipeline metric recording and running statistics.
//!
//! Counter/histogram helpers wrap the `metrics` macros at the pipeline
//! milestones; `RunningStats` is the online statistics container the sync
//! engine aggregates latencies and offsets with.

use metrics::{counter, gauge, histogram};

/// Record a successfully decoded packet.
pub fn record_packet_decoded(device_id: &str) {
    counter!(
        "fieldsync_packets_decoded_total",
        "device_id" => device_id.to_string()
    )
    .increment(1);
}

/// Record a per-file decode failure.
pub fn record_decode_failure(device_id: &str) {
    counter!(
        "fieldsync_decode_failures_total",
        "device_id" => device_id.to_string()
    )
    .increment(1);
}

/// Record a resolved time-sync analysis over one packet list.
pub fn record_sync_resolution(device_id: &str, best_latency_us: Option<f64>, best_offset_us: f64) {
    counter!(
        "fieldsync_sync_resolutions_total",
        "device_id" => device_id.to_string()
    )
    .increment(1);

    if let Some(latency) = best_latency_us {
        histogram!("fieldsync_best_latency_us").record(latency);
        gauge!(
            "fieldsync_best_offset_us",
            "device_id" => device_id.to_string()
        )
        .set(best_offset_us);
    } else {
        counter!(
            "fieldsync_sync_no_exchanges_total",
            "device_id" => device_id.to_string()
        )
        .increment(1);
    }
}

/// Record a detected continuity time gap.
pub fn record_time_gap(device_id: &str, gap_s: f64) {
    counter!(
        "fieldsync_time_gaps_total",
        "device_id" => device_id.to_string()
    )
    .increment(1);
    histogram!("fieldsync_time_gap_seconds").record(gap_s);
}

/// Record a detected sensor-configuration change.
pub fn record_sensor_change(device_id: &str) {
    counter!(
        "fieldsync_sensor_changes_total",
        "device_id" => device_id.to_string()
    )
    .increment(1);
}

/// Record a concatenation producing one merged packet from `run_len` inputs.
pub fn record_packets_merged(device_id: &str, run_len: usize) {
    counter!(
        "fieldsync_merged_packets_total",
        "device_id" => device_id.to_string()
    )
    .increment(1);
    histogram!("fieldsync_merge_run_length").record(run_len as f64);
}

/// Pipeline metrics aggregator
///
/// In-memory aggregation for summary output at the end of a batch.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetricsAggregator {
    /// Packets decoded
    pub packets_decoded: u64,

    /// Decode failures
    pub decode_failures: u64,

    /// Time gaps detected
    pub time_gaps: u64,

    /// Sensor-configuration changes detected
    pub sensor_changes: u64,

    /// Merged packets emitted
    pub merged_packets: u64,

    /// Best-latency statistics (µs)
    pub latency_stats: RunningStats,

    /// Best-offset statistics (µs)
    pub offset_stats: RunningStats,
}

impl PipelineMetricsAggregator {
    /// Create a new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decode outcome
    pub fn record_decode(&mut self, ok: bool) {
        if ok {
            self.packets_decoded += 1;
        } else {
            self.decode_failures += 1;
        }
    }

    /// Record one resolved sync analysis
    pub fn record_sync(&mut self, best_latency_us: Option<f64>, best_offset_us: f64) {
        if let Some(latency) = best_latency_us {
            self.latency_stats.push(latency);
            self.offset_stats.push(best_offset_us);
        }
    }

    /// Record continuity findings
    pub fn record_continuity(&mut self, gaps: usize, changes: usize) {
        self.time_gaps += gaps as u64;
        self.sensor_changes += changes as u64;
    }

    /// Record merged output
    pub fn record_merge(&mut self, merged: usize) {
        self.merged_packets += merged as u64;
    }

    /// Generate a summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            packets_decoded: self.packets_decoded,
            decode_failures: self.decode_failures,
            time_gaps: self.time_gaps,
            sensor_changes: self.sensor_changes,
            merged_packets: self.merged_packets,
            latency_us: StatsSummary::from(&self.latency_stats),
            offset_us: StatsSummary::from(&self.offset_stats),
        }
    }

    /// Reset statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub packets_decoded: u64,
    pub decode_failures: u64,
    pub time_gaps: u64,
    pub sensor_changes: u64,
    pub merged_packets: u64,
    pub latency_us: StatsSummary,
    pub offset_us: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pipeline Metrics Summary ===")?;
        writeln!(f, "Packets decoded: {}", self.packets_decoded)?;
        writeln!(f, "Decode failures: {}", self.decode_failures)?;
        writeln!(f, "Time gaps: {}", self.time_gaps)?;
        writeln!(f, "Sensor changes: {}", self.sensor_changes)?;
        writeln!(f, "Merged packets: {}", self.merged_packets)?;
        writeln!(f, "Best latency (µs): {}", self.latency_us)?;
        writeln!(f, "Best offset (µs): {}", self.offset_us)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics calculator (Welford's algorithm) with pooled merging.
///
/// `push` consumes raw samples; `merge`/`from_summary` combine already
/// aggregated (mean, std, n) triples without revisiting raw samples, which
/// is how the sync engine pools statistics across exchanges and packets.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a raw sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Reconstruct a container from an already aggregated summary.
    ///
    /// Extremes are unknowable from a summary; min/max are seeded with the
    /// mean and only refined by later `push`/`merge` calls.
    pub fn from_summary(mean: f64, std_dev: f64, count: u64) -> Self {
        if count == 0 {
            return Self::default();
        }
        let m2 = if count < 2 {
            0.0
        } else {
            std_dev * std_dev * (count - 1) as f64
        };
        Self {
            count,
            mean,
            m2,
            min: mean,
            max: mean,
        }
    }

    /// Pooled merge of another container into this one (Chan et al.
    /// parallel combination of mean and M2).
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let n1 = self.count as f64;
        let n2 = other.count as f64;
        let total = n1 + n2;
        let delta = other.mean - self.mean;

        self.mean += delta * n2 / total;
        self.m2 += other.m2 + delta * delta * n1 * n2 / total;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Sample count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Variance (sample, n-1)
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum
    pub fn max(&self) -> f64 {
        self.max
    }
}
