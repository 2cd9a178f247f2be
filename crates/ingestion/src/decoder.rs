//! Packet decoder: envelope bytes -> typed `contracts::Packet`
//!
//! The decoder owns the only construction path for packets; the channel
//! index is built here, once, and never mutated afterwards.

use contracts::{Channel, EvenlySampledChannel, Packet, UnevenlySampledChannel};
use tracing::{instrument, trace};

use crate::envelope;
use crate::error::Result;
use crate::schema::{
    self, WireChannelBody, WireEvenlySampledChannel, WirePacket, WireUnevenlySampledChannel,
};

/// Decode one compressed envelope into a typed packet.
#[instrument(name = "decode_packet", level = "debug", skip(buf), fields(buf_len = buf.len()))]
pub fn decode_packet(buf: &[u8]) -> Result<Packet> {
    let raw = envelope::decode(buf)?;
    let wire = schema::decode_message(&raw)?;
    trace!(
        device_id = %wire.device_id,
        evenly = wire.evenly_sampled.len(),
        unevenly = wire.unevenly_sampled.len(),
        "schema message decoded"
    );
    Ok(packet_from_wire(wire))
}

/// Encode a packet back into a compressed envelope.
///
/// Producer-side counterpart of [`decode_packet`]; fixtures and tests build
/// their inputs with it.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
    let raw = schema::encode_message(&wire_from_packet(packet))?;
    Ok(envelope::encode(&raw))
}

/// Convert a wire message into the owned packet model.
pub fn packet_from_wire(wire: WirePacket) -> Packet {
    Packet {
        device_id: wire.device_id.into(),
        uuid: wire.uuid,
        auth_email: wire.auth_email,
        auth_token: wire.auth_token,
        metadata: wire.metadata,
        app_start_epoch_us: wire.app_start_epoch_us,
        app_start_mach_us: wire.app_start_mach_us,
        mach_time_zero: wire.mach_time_zero,
        evenly_sampled: wire
            .evenly_sampled
            .into_iter()
            .map(evenly_from_wire)
            .collect(),
        unevenly_sampled: wire
            .unevenly_sampled
            .into_iter()
            .map(unevenly_from_wire)
            .collect(),
        best_latency: None,
        best_offset: 0.0,
        is_synch_corrected: false,
        ..Default::default()
    }
    .indexed()
}

fn channel_from_body(body: WireChannelBody) -> Channel {
    Channel {
        sensor_name: body.sensor_name,
        channel_types: body.channel_types,
        payload: body.payload,
        metadata: body.metadata,
        value_means: body.value_means,
        value_stds: body.value_stds,
        value_medians: body.value_medians,
    }
}

fn evenly_from_wire(wire: WireEvenlySampledChannel) -> EvenlySampledChannel {
    EvenlySampledChannel {
        channel: channel_from_body(wire.body),
        sample_rate_hz: wire.sample_rate_hz,
        first_sample_timestamp_us: wire.first_sample_timestamp_us,
    }
}

fn unevenly_from_wire(wire: WireUnevenlySampledChannel) -> UnevenlySampledChannel {
    UnevenlySampledChannel {
        channel: channel_from_body(wire.body),
        timestamps_us: wire.timestamps_us,
        sample_interval_mean_us: wire.sample_interval_mean_us,
        sample_interval_std_us: wire.sample_interval_std_us,
        sample_interval_median_us: wire.sample_interval_median_us,
    }
}

fn body_from_channel(channel: &Channel) -> WireChannelBody {
    WireChannelBody {
        sensor_name: channel.sensor_name.clone(),
        channel_types: channel.channel_types.clone(),
        payload: channel.payload.clone(),
        metadata: channel.metadata.clone(),
        value_means: channel.value_means.clone(),
        value_stds: channel.value_stds.clone(),
        value_medians: channel.value_medians.clone(),
    }
}

fn wire_from_packet(packet: &Packet) -> WirePacket {
    WirePacket {
        api: 900,
        device_id: packet.device_id.to_string(),
        uuid: packet.uuid.clone(),
        auth_email: packet.auth_email.clone(),
        auth_token: packet.auth_token.clone(),
        app_start_epoch_us: packet.app_start_epoch_us,
        app_start_mach_us: packet.app_start_mach_us,
        mach_time_zero: packet.mach_time_zero,
        metadata: packet.metadata.clone(),
        evenly_sampled: packet
            .evenly_sampled
            .iter()
            .map(|ch| WireEvenlySampledChannel {
                body: body_from_channel(&ch.channel),
                sample_rate_hz: ch.sample_rate_hz,
                first_sample_timestamp_us: ch.first_sample_timestamp_us,
            })
            .collect(),
        unevenly_sampled: packet
            .unevenly_sampled
            .iter()
            .map(|ch| WireUnevenlySampledChannel {
                body: body_from_channel(&ch.channel),
                timestamps_us: ch.timestamps_us.clone(),
                sample_interval_mean_us: ch.sample_interval_mean_us,
                sample_interval_std_us: ch.sample_interval_std_us,
                sample_interval_median_us: ch.sample_interval_median_us,
            })
            .collect(),
    }
}
