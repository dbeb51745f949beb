//! Wire-level error types.

use core::fmt;

/// Errors raised while reading or writing framed messages.
///
/// A peer closing its connection at a record boundary is not an error;
/// `read_message` reports it as `Ok(None)`.
#[derive(Debug)]
pub enum WireError {
    Io(std::io::Error),
    Encode(serde_json::Error),
    Decode(serde_json::Error),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) | Self::Decode(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for WireError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
