//! Inbound classification: wire frames to a closed set of message variants.
//!
//! DESIGN
//! ======
//! A frame is decoded once into its batch of messages, and each message is
//! classified once, in priority order:
//!
//! 1. `/meta/handshake` response
//! 2. `/meta/subscribe` response
//! 3. expired client id (`error == "ClientID_Expired"`)
//! 4. payload with a `groupId`
//! 5. anything else
//!
//! The session matches on [`Inbound`] and never inspects raw fields itself.
//! Frames that are not text or not valid JSON batches are rejected as a
//! whole. Inside a batch, an element that is not a valid message becomes
//! [`Inbound::Rejected`] in its wire position; the rest still dispatch.

use frames::{CodecError, HANDSHAKE_CHANNEL, Message, SUBSCRIBE_CHANNEL};
use serde_json::Value;

use crate::transport::WireFrame;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("received a non-text frame ({len} bytes)")]
    NotText { len: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    HandshakeResponse {
        successful: bool,
        client_id: Option<String>,
        error: Option<String>,
    },
    SubscribeResponse {
        successful: bool,
        subscription: Option<String>,
        error: Option<String>,
    },
    SessionExpired,
    GroupPayload { group_id: String, payload: Value },
    GenericPayload(Value),
    /// A batch element that did not decode as a message.
    Rejected { error: String },
}

impl Inbound {
    /// Classify a single decoded message.
    #[must_use]
    pub fn classify(message: Message) -> Self {
        if message.channel == HANDSHAKE_CHANNEL {
            return Self::HandshakeResponse {
                successful: message.is_successful(),
                client_id: message.client_id,
                error: message.error,
            };
        }
        if message.channel == SUBSCRIBE_CHANNEL {
            return Self::SubscribeResponse {
                successful: message.is_successful(),
                subscription: message.subscription,
                error: message.error,
            };
        }
        if message.is_client_id_expired() {
            return Self::SessionExpired;
        }

        let payload = message.to_value();
        match message.group_id {
            Some(group_id) if !group_id.is_empty() => Self::GroupPayload { group_id, payload },
            _ => Self::GenericPayload(payload),
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HandshakeResponse { .. } => "handshake_response",
            Self::SubscribeResponse { .. } => "subscribe_response",
            Self::SessionExpired => "session_expired",
            Self::GroupPayload { .. } => "group_payload",
            Self::GenericPayload(_) => "generic_payload",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// Decode one wire frame into its classified messages, in wire order.
///
/// # Errors
///
/// Returns [`DecodeError::NotText`] for binary frames and
/// [`DecodeError::Codec`] when the text is not a JSON array or object.
pub fn decode_inbound(frame: &WireFrame) -> Result<Vec<Inbound>, DecodeError> {
    let text = match frame {
        WireFrame::Text(text) => text,
        WireFrame::Binary(bytes) => return Err(DecodeError::NotText { len: bytes.len() }),
    };
    let batch = frames::decode_batch(text)?;
    Ok(batch
        .into_iter()
        .map(|decoded| match decoded {
            Ok(message) => Inbound::classify(message),
            Err(error) => Inbound::Rejected { error: error.to_string() },
        })
        .collect())
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
