//! Errors raised converting between domain types and their wire encoding.

use std::fmt;

/// A request or response could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The protobuf bytes did not parse.
    Protobuf(String),
    /// A `Content-Type` this crate does not implement a decoder for.
    UnsupportedContentType(String),
    /// A message was structurally well-formed but violated an invariant
    /// (e.g. `values.len() != absent.len()`).
    Invariant(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Protobuf(msg) => write!(f, "protobuf decode failed: {msg}"),
            WireError::UnsupportedContentType(ct) => write!(f, "unsupported content type: {ct}"),
            WireError::Invariant(msg) => write!(f, "invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<prost::DecodeError> for WireError {
    fn from(err: prost::DecodeError) -> Self {
        WireError::Protobuf(err.to_string())
    }
}
