//! # Sync Engine
//!
//! Device-to-server clock synchronization over tri-message exchanges.
//!
//! Responsibilities:
//! - Per-exchange latency/offset estimation (`TriMessageStats`)
//! - Sensor-configuration stability validation
//! - List-wide best latency/offset resolution
//! - In-place timestamp rebaselining (`sync_packet_time`)
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::TimeSyncEngine;
//!
//! // packets: one device, one continuous session, sorted by timestamp
//! let analysis = TimeSyncEngine::analyze(&packets)?;
//! TimeSyncEngine::sync_packet_time(&mut packets, &analysis);
//! ```

mod engine;
mod error;
mod tri_message;

pub use engine::{TimeSyncAnalysis, TimeSyncEngine};
pub use error::{Result, SyncError};
pub use tri_message::{ExchangeArm, TriMessageStats, EXCHANGE_STRIDE};

// Re-export the statistics container the analysis exposes
pub use observability::RunningStats;
