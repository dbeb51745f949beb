//! Node-side error types.

use core::fmt;

use cohort_wire::WireError;

/// Errors surfaced by the node API.
#[derive(Debug)]
pub enum NodeError {
    /// The hub connection is gone. Transport failure is fatal to the node:
    /// every blocking call returns this once the reader loop has exited.
    Closed,
    Io(std::io::Error),
    Wire(WireError),
    /// A received payload did not decode to the caller's expected type.
    Decode(serde_json::Error),
    /// A payload could not be encoded for sending.
    Encode(serde_json::Error),
    /// The caller broke an API contract the runtime can still report.
    Protocol(&'static str),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "hub connection closed"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Wire(e) => write!(f, "wire error: {e}"),
            Self::Decode(e) => write!(f, "payload decode error: {e}"),
            Self::Encode(e) => write!(f, "payload encode error: {e}"),
            Self::Protocol(msg) => write!(f, "protocol misuse: {msg}"),
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Wire(e) => Some(e),
            Self::Decode(e) | Self::Encode(e) => Some(e),
            Self::Closed | Self::Protocol(_) => None,
        }
    }
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WireError> for NodeError {
    fn from(e: WireError) -> Self {
        Self::Wire(e)
    }
}
