//! Decode worker pool
//!
//! Decoding independent files shares no mutable state, so entries fan out
//! over a bounded channel to N workers and results are re-ordered by entry
//! index on collection. A failed entry yields an error outcome for that
//! entry only; the batch always runs to completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{DecodeConfig, DeviceId, Packet};
use tracing::{debug, instrument, warn};

use crate::decoder;
use crate::error::DecodeError;
use crate::source::{MemorySource, PacketEntry, PacketSource};

/// Decode metrics
#[derive(Debug, Default)]
pub struct DecodeMetrics {
    /// Packets decoded successfully
    pub decoded: AtomicU64,

    /// Entries that failed to decode
    pub failed: AtomicU64,
}

impl DecodeMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful decode
    pub fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed decode
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> DecodeMetricsSnapshot {
        DecodeMetricsSnapshot {
            decoded: self.decoded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeMetricsSnapshot {
    /// Packets decoded successfully
    pub decoded: u64,

    /// Entries that failed to decode
    pub failed: u64,
}

/// Outcome of decoding one source entry.
#[derive(Debug)]
pub struct DecodeOutcome {
    /// Position of the entry in the source order
    pub entry_index: usize,

    /// Device id from the source entry
    pub device_id: DeviceId,

    /// Entry timestamp from the source
    pub timestamp_us: i64,

    /// Decoded packet, or the per-file failure
    pub result: Result<Packet, DecodeError>,
}

/// Decode every entry of a source on a worker pool.
///
/// Outcomes are returned in source order regardless of which worker finished
/// first. Worker count and channel capacity come from `config`; a worker
/// count of zero is clamped to one.
#[instrument(name = "decode_pool", skip(source, config, metrics), fields(workers = config.workers))]
pub async fn decode_all<S>(
    mut source: S,
    config: DecodeConfig,
    metrics: Arc<DecodeMetrics>,
) -> Vec<DecodeOutcome>
where
    S: PacketSource + 'static,
{
    let workers = config.workers.max(1);
    let (entry_tx, entry_rx) = async_channel::bounded::<(usize, PacketEntry)>(
        config.channel_capacity.max(1),
    );
    let (result_tx, result_rx) = async_channel::bounded::<DecodeOutcome>(
        config.channel_capacity.max(1),
    );

    let feeder = tokio::spawn(async move {
        let mut index = 0usize;
        while let Some(entry) = source.next_entry() {
            if entry_tx.send((index, entry)).await.is_err() {
                break;
            }
            index += 1;
        }
        index
    });

    let worker_handles: Vec<_> = (0..workers)
        .map(|worker_id| {
            let rx = entry_rx.clone();
            let tx = result_tx.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                while let Ok((entry_index, entry)) = rx.recv().await {
                    let result = decoder::decode_packet(&entry.data);
                    match &result {
                        Ok(packet) => {
                            metrics.record_decoded();
                            record_decoded_counter(packet);
                        }
                        Err(e) => {
                            metrics.record_failed();
                            warn!(
                                worker_id,
                                device_id = %entry.device_id,
                                timestamp_us = entry.timestamp_us,
                                error = %e,
                                "entry failed to decode"
                            );
                            record_failed_counter(&entry.device_id);
                        }
                    }
                    let outcome = DecodeOutcome {
                        entry_index,
                        device_id: entry.device_id,
                        timestamp_us: entry.timestamp_us,
                        result,
                    };
                    if tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            })
        })
        .collect();

    // Collector owns the only live receiver once worker clones are dropped
    drop(entry_rx);
    drop(result_tx);

    let mut outcomes = Vec::new();
    while let Ok(outcome) = result_rx.recv().await {
        outcomes.push(outcome);
    }

    let total = feeder.await.unwrap_or(0);
    for handle in worker_handles {
        let _ = handle.await;
    }

    outcomes.sort_by_key(|o| o.entry_index);
    debug!(total, decoded = outcomes.len(), "decode pool drained");
    outcomes
}

/// Decode a pre-built entry list on a worker pool.
pub async fn decode_entries(
    entries: Vec<PacketEntry>,
    config: DecodeConfig,
) -> Vec<DecodeOutcome> {
    decode_all(MemorySource::new(entries), config, Arc::new(DecodeMetrics::new())).await
}

fn record_decoded_counter(packet: &Packet) {
    metrics::counter!(
        "fieldsync_packets_decoded_total",
        "device_id" => packet.device_id.to_string()
    )
    .increment(1);
}

fn record_failed_counter(device_id: &DeviceId) {
    metrics::counter!(
        "fieldsync_decode_failures_total",
        "device_id" => device_id.to_string()
    )
    .increment(1);
}
