//! Packet source boundary
//!
//! Directory layout, file discovery and time-range filtering belong to an
//! external indexing collaborator; the pipeline consumes an ordered sequence
//! of (device id, timestamp, raw envelope bytes) entries through this trait.

use bytes::Bytes;
use contracts::DeviceId;
use std::collections::VecDeque;

/// One raw packet file, as handed over by the indexing collaborator.
#[derive(Debug, Clone)]
pub struct PacketEntry {
    /// Device the file was recorded on
    pub device_id: DeviceId,

    /// File timestamp (machine clock, µs) used for ordering
    pub timestamp_us: i64,

    /// Raw compressed envelope bytes
    pub data: Bytes,
}

/// Pull-based source of raw packet entries, ordered by the collaborator.
pub trait PacketSource: Send {
    /// Next entry in (device, timestamp) order; `None` when exhausted.
    fn next_entry(&mut self) -> Option<PacketEntry>;
}

/// In-memory source over a pre-built entry list.
///
/// The indexing collaborator in tests and fixtures; also handy for callers
/// that already hold all file bytes.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: VecDeque<PacketEntry>,
}

impl MemorySource {
    /// Create a source over the given entries, preserving their order.
    pub fn new(entries: Vec<PacketEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Remaining entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PacketSource for MemorySource {
    fn next_entry(&mut self) -> Option<PacketEntry> {
        self.entries.pop_front()
    }
}
