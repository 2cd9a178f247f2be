//! Packet - decoded field-recorder packet
//!
//! One packet per recorded file. Created by the decoder, mutated in place
//! only by the time-sync engine, read-only everywhere else.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    ChannelType, DeviceId, EvenlySampledChannel, SchemaError, UnevenlySampledChannel,
};

/// Location of the channel owning a component tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRef {
    /// Index into `evenly_sampled`
    Evenly(usize),
    /// Index into `unevenly_sampled`
    Unevenly(usize),
}

/// Borrowed view of either channel kind.
#[derive(Debug, Clone, Copy)]
pub enum ChannelHandle<'a> {
    Evenly(&'a EvenlySampledChannel),
    Unevenly(&'a UnevenlySampledChannel),
}

impl<'a> ChannelHandle<'a> {
    /// The common channel body.
    pub fn channel(&self) -> &'a crate::Channel {
        match self {
            ChannelHandle::Evenly(ch) => &ch.channel,
            ChannelHandle::Unevenly(ch) => &ch.channel,
        }
    }

    /// Sample rate, evenly-sampled channels only.
    pub fn sample_rate_hz(&self) -> Option<f64> {
        match self {
            ChannelHandle::Evenly(ch) => Some(ch.sample_rate_hz),
            ChannelHandle::Unevenly(_) => None,
        }
    }

    pub fn sensor_name(&self) -> &str {
        &self.channel().sensor_name
    }
}

/// Decoded field-recorder packet.
///
/// The channel-type index is built once at construction and never mutated
/// afterwards; timestamp correction rewrites channel contents but never the
/// channel layout, so the index stays valid for the packet's lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Packet {
    /// Recorder device id
    pub device_id: DeviceId,

    /// Install uuid of the recording app
    pub uuid: String,

    /// Authenticated account email (schema boundary field)
    pub auth_email: String,

    /// Server authentication token (schema boundary field)
    pub auth_token: String,

    /// Ordered packet-level metadata pairs, duplicates allowed
    pub metadata: Vec<(String, String)>,

    /// App file start, wall clock, microseconds since epoch
    pub app_start_epoch_us: i64,

    /// App file start, machine clock, microseconds
    pub app_start_mach_us: i64,

    /// Device monotonic clock epoch ("mach time zero"), microseconds
    pub mach_time_zero: i64,

    /// Fixed-rate channels
    pub evenly_sampled: Vec<EvenlySampledChannel>,

    /// Explicitly-timestamped channels
    pub unevenly_sampled: Vec<UnevenlySampledChannel>,

    /// Best round-trip latency resolved by time sync (µs), if any
    pub best_latency: Option<f64>,

    /// Clock offset applied by time sync (µs); 0.0 until corrected
    pub best_offset: f64,

    /// Whether `sync_packet_time` has been applied
    pub is_synch_corrected: bool,

    /// Component tag -> owning channel. Built by `rebuild_index`; read-only
    /// afterwards. Not serialized.
    #[serde(skip)]
    pub channel_index: HashMap<ChannelType, ChannelRef>,
}

impl Packet {
    /// Rebuild the channel-type index.
    ///
    /// Must be called after field-wise construction or deserialization.
    /// First channel claiming a tag wins; the schema does not repeat tags
    /// across channels in well-formed packets.
    pub fn rebuild_index(&mut self) {
        self.channel_index.clear();
        for (i, ch) in self.evenly_sampled.iter().enumerate() {
            for ct in &ch.channel.channel_types {
                self.channel_index.entry(*ct).or_insert(ChannelRef::Evenly(i));
            }
        }
        for (i, ch) in self.unevenly_sampled.iter().enumerate() {
            for ct in &ch.channel.channel_types {
                self.channel_index
                    .entry(*ct)
                    .or_insert(ChannelRef::Unevenly(i));
            }
        }
    }

    /// Consume and return self with the index built. Constructor tail.
    pub fn indexed(mut self) -> Self {
        self.rebuild_index();
        self
    }

    /// Where the channel owning `component` lives, if present.
    pub fn channel_ref(&self, component: ChannelType) -> Option<ChannelRef> {
        self.channel_index.get(&component).copied()
    }

    /// Borrow the channel owning `component`.
    pub fn channel(&self, component: ChannelType) -> Option<ChannelHandle<'_>> {
        match self.channel_ref(component)? {
            ChannelRef::Evenly(i) => self.evenly_sampled.get(i).map(ChannelHandle::Evenly),
            ChannelRef::Unevenly(i) => self.unevenly_sampled.get(i).map(ChannelHandle::Unevenly),
        }
    }

    /// Borrow an evenly-sampled channel by component tag.
    pub fn evenly(&self, component: ChannelType) -> Option<&EvenlySampledChannel> {
        match self.channel_ref(component)? {
            ChannelRef::Evenly(i) => self.evenly_sampled.get(i),
            ChannelRef::Unevenly(_) => None,
        }
    }

    /// Mutably borrow an evenly-sampled channel by component tag.
    pub fn evenly_mut(&mut self, component: ChannelType) -> Option<&mut EvenlySampledChannel> {
        match self.channel_ref(component)? {
            ChannelRef::Evenly(i) => self.evenly_sampled.get_mut(i),
            ChannelRef::Unevenly(_) => None,
        }
    }

    /// Borrow an unevenly-sampled channel by component tag.
    pub fn unevenly(&self, component: ChannelType) -> Option<&UnevenlySampledChannel> {
        match self.channel_ref(component)? {
            ChannelRef::Unevenly(i) => self.unevenly_sampled.get(i),
            ChannelRef::Evenly(_) => None,
        }
    }

    /// The primary audio channel.
    pub fn microphone(&self) -> Option<&EvenlySampledChannel> {
        self.evenly(ChannelType::Microphone)
    }

    /// Mutable primary audio channel.
    pub fn microphone_mut(&mut self) -> Option<&mut EvenlySampledChannel> {
        self.evenly_mut(ChannelType::Microphone)
    }

    /// Raw tri-message exchange timestamps (flat, stride 6).
    ///
    /// `Ok(None)` when no time-synchronization channel is present (a device
    /// that never exchanged); `SchemaError` when the channel exists but its
    /// payload is not the i64 variant the schema requires.
    pub fn tri_message_payload(&self) -> Result<Option<&[i64]>, SchemaError> {
        let ch = match self.unevenly(ChannelType::TimeSynchronization) {
            Some(ch) => ch,
            None => return Ok(None),
        };
        match &ch.channel.payload {
            crate::ChannelPayload::I64(v) => Ok(Some(v)),
            other => Err(SchemaError::UnsupportedPayload {
                sensor_name: ch.channel.sensor_name.clone(),
                tag: other.tag(),
            }),
        }
    }
}
