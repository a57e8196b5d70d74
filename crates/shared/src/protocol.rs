//! Wire codec for the notification channel.
//!
//! Inbound frames are JSON envelopes:
//!
//! ```json
//! {"type": "system_message", "message": {"id": "1", "recipient_id": "u1", ...}}
//! ```
//!
//! Outbound frames are `{"message": "<text>"}`. Both directions are pure
//! functions; nothing here touches the network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::DecodeError;
use crate::models::{MessageType, SystemMessage};

/// Envelope `type` of the only inbound frame this client understands.
pub const SYSTEM_MESSAGE_TYPE: &str = "system_message";

/// WebSocket close code for a deliberate, clean shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close status reported when the peer sent a close frame without a code.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Close status reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Nested payload of a `system_message` envelope, as the server sends it.
#[derive(Debug, Deserialize)]
struct WireSystemMessage {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(deserialize_with = "string_or_number")]
    recipient_id: String,
    #[serde(default)]
    title: Option<String>,
    message: String,
    message_type: MessageType,
    #[serde(default)]
    link: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<WireSystemMessage> for SystemMessage {
    fn from(wire: WireSystemMessage) -> Self {
        SystemMessage {
            id: wire.id,
            recipient_id: wire.recipient_id,
            title: wire.title,
            message: wire.message,
            message_type: wire.message_type,
            link: wire.link,
            is_read: wire.is_read,
            created_at: wire.created_at,
        }
    }
}

/// Outbound frame body.
#[derive(Debug, Serialize)]
pub struct OutboundMessage<'a> {
    pub message: &'a str,
}

/// Decode one inbound text frame into a [`SystemMessage`].
pub fn decode(frame: &str) -> Result<SystemMessage, DecodeError> {
    let mut envelope: Value = serde_json::from_str(frame)?;

    let kind = envelope
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;
    if kind != SYSTEM_MESSAGE_TYPE {
        return Err(DecodeError::UnknownType(kind.to_string()));
    }

    let payload = envelope
        .get_mut("message")
        .map(Value::take)
        .unwrap_or(Value::Null);
    let wire: WireSystemMessage =
        serde_json::from_value(payload).map_err(DecodeError::InvalidPayload)?;

    Ok(wire.into())
}

/// Encode outbound text as `{"message": text}`.
pub fn encode(text: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundMessage { message: text })
}

/// Ids arrive as strings from some backends and as integers from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
