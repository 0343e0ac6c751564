//! Local error type for bus operations.

use crate::message::Error;

/// Everything that can go wrong when talking to the host.
///
/// Encoding problems are detected before anything crosses the boundary and
/// are never retried. Application failures reported by the host arrive as
/// [`BusError::Host`], including timeouts.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// A request or envelope could not be encoded.
    #[error("marshalling: {0}")]
    Marshal(#[source] std::io::Error),

    /// A reply or envelope could not be decoded as the expected type.
    #[error("unmarshalling: {0}")]
    Unmarshal(#[source] std::io::Error),

    /// The host call itself failed to complete.
    #[error("host call failed: {0}")]
    Transport(String),

    /// The host answered with a structured error.
    #[error("{0}")]
    Host(#[from] Error),

    /// The KV store holds no value for the requested key.
    #[error("not found")]
    NotFound,

    /// Log arguments were not a flat sequence of string keys and values.
    #[error("invalid log arguments: {0}")]
    InvalidLogArgs(String),

    /// A JSON value stored or loaded through the bus did not (de)serialize.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Plugin configuration was rejected.
    #[error("invalid config: {0}")]
    Config(String),
}

impl BusError {
    /// Whether this is a host-reported timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Host(e) if e.is_timeout())
    }

    /// The structured host error, if the host reported one.
    #[must_use]
    pub fn host_error(&self) -> Option<&Error> {
        match self {
            Self::Host(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;
