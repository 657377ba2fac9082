//! Error types for DeckRocket wire formats.

use thiserror::Error;

/// Errors that can occur while encoding or decoding DeckRocket payloads.
#[derive(Debug, Error)]
pub enum DeckError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Payload matches none of the known message shapes
    #[error("unrecognized payload ({0} bytes)")]
    UnrecognizedPayload(usize),

    /// Slide index could not be derived from the payload
    #[error("invalid slide index: {0}")]
    InvalidIndex(String),
}
