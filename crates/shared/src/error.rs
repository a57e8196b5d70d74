//! Errors produced while decoding inbound frames.

use thiserror::Error;

/// Reasons an inbound frame could not be turned into a [`SystemMessage`].
///
/// None of these are fatal to the connection: the frame is logged and dropped.
///
/// [`SystemMessage`]: crate::models::SystemMessage
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope has no string `type` field.
    #[error("envelope is missing a `type` field")]
    MissingType,

    /// The envelope carries a type this client does not handle.
    #[error("unknown envelope type `{0}`")]
    UnknownType(String),

    /// The envelope is a system message but its payload does not match the wire shape.
    #[error("invalid system_message payload: {0}")]
    InvalidPayload(serde_json::Error),
}

impl DecodeError {
    /// Unknown envelopes are expected traffic, everything else is a protocol fault.
    pub fn is_unknown_envelope(&self) -> bool {
        matches!(self, DecodeError::UnknownType(_))
    }
}
