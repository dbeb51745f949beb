//! Message representation.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Out-of-band service calls understood by the hub's control dispatcher.
///
/// The values are carried in the `sink` field of a node-to-hub service call
/// and in the `source` field of a hub-to-node service reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCode {
    /// Register a node; the request tag carries the node id, the reply tag
    /// carries the cohort size.
    Init,
    /// Node is going away; the tag carries the node id.
    Terminate,
    /// Named barrier arrival (request) or release (reply); the tag carries
    /// the barrier tag.
    Barrier,
    /// Print the payload on the hub's standard output. No reply.
    Print,
    /// Fan the payload out to every registered node. A zero tag includes
    /// the originator, a nonzero tag excludes it.
    Broadcast,
}

impl ServiceCode {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            -1 => Some(Self::Init),
            -2 => Some(Self::Terminate),
            -3 => Some(Self::Barrier),
            -4 => Some(Self::Print),
            -5 => Some(Self::Broadcast),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Init => -1,
            Self::Terminate => -2,
            Self::Barrier => -3,
            Self::Print => -4,
            Self::Broadcast => -5,
        }
    }
}

impl fmt::Display for ServiceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Terminate => write!(f, "terminate"),
            Self::Barrier => write!(f, "barrier"),
            Self::Print => write!(f, "print"),
            Self::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// One routed message.
///
/// The payload is a self-describing JSON value; receivers decode it to the
/// type they expect at receive time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub source: i64,
    pub sink: i64,
    pub tag: i64,
    pub payload: Value,
}

impl Message {
    /// Create a point-to-point message between two nodes.
    pub fn new(source: i64, sink: i64, tag: i64, payload: Value) -> Self {
        Self {
            source,
            sink,
            tag,
            payload,
        }
    }

    /// Create a node-to-hub service call.
    pub fn service_call(code: ServiceCode, source: i64, tag: i64, payload: Value) -> Self {
        Self {
            source,
            sink: code.as_i64(),
            tag,
            payload,
        }
    }

    /// Create a hub-to-node service reply addressed to `sink`.
    pub fn service_reply(code: ServiceCode, sink: i64, tag: i64, payload: Value) -> Self {
        Self {
            source: code.as_i64(),
            sink,
            tag,
            payload,
        }
    }

    /// True if this is a node-to-hub service call.
    pub fn is_service_call(&self) -> bool {
        self.sink < 0
    }

    /// True if this is a hub-to-node service reply.
    pub fn is_service_reply(&self) -> bool {
        self.source < 0
    }
}
