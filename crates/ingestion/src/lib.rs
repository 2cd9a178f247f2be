//! # Ingestion
//!
//! Raw packet files in, typed packets out.
//!
//! Responsibilities:
//! - Frame envelope codec (length-prefixed LZ4 block)
//! - Wire schema message decode (collaborator boundary)
//! - Packet construction with the decode-time channel index
//! - Packet validation findings
//! - Worker-pool decoding of independent files
//!
//! ## Example
//!
//! ```ignore
//! use ingestion::{decode_entries, PacketEntry};
//!
//! let outcomes = decode_entries(entries, config.decode).await;
//! for outcome in outcomes {
//!     match outcome.result {
//!         Ok(packet) => handle(packet),
//!         Err(e) => tracing::warn!(error = %e, "skipping file"),
//!     }
//! }
//! ```

pub mod envelope;
pub mod schema;
pub mod validator;

mod decoder;
mod error;
mod pool;
mod source;

pub use decoder::{decode_packet, encode_packet, packet_from_wire};
pub use error::{DecodeError, Result};
pub use pool::{decode_all, decode_entries, DecodeMetrics, DecodeMetricsSnapshot, DecodeOutcome};
pub use source::{MemorySource, PacketEntry, PacketSource};
pub use validator::{validate_packet, ValidationFinding};
