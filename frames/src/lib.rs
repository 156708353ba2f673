//! Bayeux message model and JSON codec for the push channel.
//!
//! This crate owns the wire representation consumed by `pushstream`. Every
//! websocket text frame carries a JSON array of messages; each message is an
//! object routed by its `channel`. Known protocol fields are typed, anything
//! else rides along in [`Message::extra`] so application payloads survive a
//! decode untouched.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// PROTOCOL CONSTANTS
// =============================================================================

/// Meta channel used to negotiate a client id.
pub const HANDSHAKE_CHANNEL: &str = "/meta/handshake";

/// Meta channel used to subscribe to user and group topics.
pub const SUBSCRIBE_CHANNEL: &str = "/meta/subscribe";

/// Meta channel used to start listening once subscriptions are in place.
pub const CONNECT_CHANNEL: &str = "/meta/connect";

/// Bayeux protocol version declared in the handshake.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Connection types advertised during the handshake.
pub const SUPPORTED_CONNECTION_TYPES: [&str; 2] = ["websocket", "callback-polling"];

/// Connection type declared on the connect/listen message.
pub const CONNECTION_TYPE: &str = "websocket";

/// `error` value the server uses to signal an expired client id.
pub const CLIENT_ID_EXPIRED: &str = "ClientID_Expired";

/// Prefix of the user-scoped topic.
pub const USER_TOPIC_PREFIX: &str = "/user/";

/// Prefix of group-scoped topics.
pub const GROUP_TOPIC_PREFIX: &str = "/group/";

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by [`encode_frame`] and [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame text is not valid JSON.
    #[error("failed to parse JSON frame: {0}")]
    Json(#[source] serde_json::Error),
    /// The frame parsed as JSON but is neither an array nor an object.
    #[error("frame is not a batch of messages")]
    NotABatch,
    /// One element of the batch is not a valid protocol message.
    #[error("invalid message in frame: {0}")]
    Message(#[source] serde_json::Error),
    /// The outgoing batch could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

// =============================================================================
// MESSAGE
// =============================================================================

/// Message id. Outbound ids are integers; some servers echo them as strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(u64),
    Text(String),
}

/// A single protocol message. One frame batches one or more of these.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_connection_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    /// Extension block. Outbound subscribes carry `access_token` + `timestamp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Every field not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Handshake request declaring protocol version and connection types.
    #[must_use]
    pub fn handshake() -> Self {
        Self {
            channel: HANDSHAKE_CHANNEL.to_owned(),
            version: Some(PROTOCOL_VERSION.to_owned()),
            supported_connection_types: Some(
                SUPPORTED_CONNECTION_TYPES
                    .iter()
                    .map(|kind| (*kind).to_owned())
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Subscribe request for `subscription`, authenticated through `ext`.
    #[must_use]
    pub fn subscribe(client_id: &str, subscription: &str, access_token: &str, timestamp: i64) -> Self {
        Self {
            channel: SUBSCRIBE_CHANNEL.to_owned(),
            client_id: Some(client_id.to_owned()),
            subscription: Some(subscription.to_owned()),
            ext: Some(serde_json::json!({
                "access_token": access_token,
                "timestamp": timestamp,
            })),
            ..Self::default()
        }
    }

    /// Connect/listen request that activates delivery on the websocket.
    #[must_use]
    pub fn connect(client_id: &str) -> Self {
        Self {
            channel: CONNECT_CHANNEL.to_owned(),
            client_id: Some(client_id.to_owned()),
            connection_type: Some(CONNECTION_TYPE.to_owned()),
            ..Self::default()
        }
    }

    /// Stamp the outgoing sequence number.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(MessageId::Number(id));
        self
    }

    /// True when the server reported `successful: true`.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.successful == Some(true)
    }

    /// True when the server signalled that our client id has expired.
    #[must_use]
    pub fn is_client_id_expired(&self) -> bool {
        self.error.as_deref() == Some(CLIENT_ID_EXPIRED)
    }

    /// The whole message as a JSON object, as handed to payload consumers.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Topic carrying events for a single user.
#[must_use]
pub fn user_topic(user_id: &str) -> String {
    format!("{USER_TOPIC_PREFIX}{user_id}")
}

/// Topic carrying events for a single group.
#[must_use]
pub fn group_topic(group_id: &str) -> String {
    format!("{GROUP_TOPIC_PREFIX}{group_id}")
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a batch of messages into one JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_frame(messages: &[Message]) -> Result<String, CodecError> {
    serde_json::to_string(messages).map_err(CodecError::Encode)
}

/// Decode one JSON text frame into its messages, in wire order.
///
/// A bare object is accepted as a batch of one.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for invalid JSON, [`CodecError::NotABatch`]
/// for scalars, and [`CodecError::Message`] when an element is not a message.
pub fn decode_frame(text: &str) -> Result<Vec<Message>, CodecError> {
    decode_batch(text)?.into_iter().collect()
}

/// Decode one JSON text frame, keeping each element's result separate.
///
/// Only frame-level problems fail the call. An element that is not a valid
/// message yields its own [`CodecError::Message`] and does not affect its
/// neighbours.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for invalid JSON and [`CodecError::NotABatch`]
/// for anything that is neither an array nor an object.
pub fn decode_batch(text: &str) -> Result<Vec<Result<Message, CodecError>>, CodecError> {
    let value = serde_json::from_str::<Value>(text).map_err(CodecError::Json)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => return Err(CodecError::NotABatch),
    };
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(CodecError::Message))
        .collect())
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
