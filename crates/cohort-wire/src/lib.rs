//! cohort-wire: message model and wire codec for the cohort runtime.
//!
//! Both executables (the hub and every node) speak the same wire format:
//! one JSON object per newline-terminated line, carrying the four message
//! fields `source`, `sink`, `tag`, `payload`.
//!
//! # Addressing convention
//!
//! - `sink >= 0`: a point-to-point message routed to that node id.
//! - `sink < 0`: a service call from a node to the hub; the sink value is a
//!   [`ServiceCode`].
//! - `source < 0`: a service reply from the hub to a node; the source value
//!   is a [`ServiceCode`].
//!
//! Application tags are positive. Tags `<= 0` are reserved for the runtime;
//! the reserved values live in [`tags`].

mod codec;
mod error;
mod message;

pub use codec::{decode, encode, read_message, write_message};
pub use error::WireError;
pub use message::{Message, ServiceCode};

/// Reserved tag values used internally by the runtime.
///
/// Barrier tags and message tags share the same `i64` domain; every reserved
/// value is negative so the application keeps the entire positive range.
pub mod tags {
    /// Barrier posted by every node at the end of `Node::init`; its release
    /// signals that the cohort is fully connected.
    pub const INIT_BARRIER: i64 = -1;
    /// Completion barrier posted at the end of a reduce.
    pub const REDUCE_BARRIER: i64 = -2;
    /// Completion barrier posted at the end of a gather.
    pub const GATHER_BARRIER: i64 = -3;
    /// Completion barrier posted at the end of a scatter.
    pub const SCATTER_BARRIER: i64 = -4;
    /// Completion barrier posted at the end of a broadcast.
    pub const BROADCAST_BARRIER: i64 = -5;
    /// Tag carried by the point-to-point data messages the collective
    /// engine exchanges during a dimension walk.
    pub const FOLD_DATA: i64 = -64;
}
