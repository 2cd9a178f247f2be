//! Frame envelope codec
//!
//! Wire format: `[4 bytes big-endian u32 = uncompressed size][LZ4 block
//! bytes, no embedded size]`. The block decompresses to exactly the size the
//! prefix declares; anything else is a malformed envelope.

use crate::error::{DecodeError, Result};

/// Decode one envelope into the raw serialized schema message.
pub fn decode(buf: &[u8]) -> Result<Vec<u8>> {
    if buf.len() < 4 {
        return Err(DecodeError::TruncatedEnvelope { len: buf.len() });
    }
    let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if size == 0 {
        return Err(DecodeError::ZeroSize);
    }

    let raw = lz4_flex::block::decompress(&buf[4..], size)?;
    if raw.len() != size {
        return Err(DecodeError::SizeMismatch {
            expected: size,
            actual: raw.len(),
        });
    }
    Ok(raw)
}

/// Encode a raw schema message into an envelope.
///
/// Exact inverse of [`decode`]: `decode(&encode(m)) == m` for all m.
pub fn encode(msg: &[u8]) -> Vec<u8> {
    let compressed = lz4_flex::block::compress(msg);
    let mut out = Vec::with_capacity(4 + compressed.len());
    out.extend_from_slice(&(msg.len() as u32).to_be_bytes());
    out.extend_from_slice(&compressed);
    out
}
