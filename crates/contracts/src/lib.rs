//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and
//! traits. All business crates can only depend on this crate, reverse
//! dependencies are prohibited.
//!
//! ## Time Model
//! - Absolute timestamps are integer microseconds (`i64`) on the device's
//!   machine clock unless a field says otherwise
//! - Derived latencies/offsets are `f64` microseconds; write-back rounds to
//!   the nearest microsecond

mod channel;
mod device_id;
mod diff;
mod error;
mod packet;
mod pipeline_config;

pub use channel::*;
pub use device_id::DeviceId;
pub use diff::{diff, fields_equal, FieldDiff, OrderedFields};
pub use error::*;
pub use packet::*;
pub use pipeline_config::*;
