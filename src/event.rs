//! Events published by a running stream.
//!
//! The session publishes a closed set of event kinds over an unbounded
//! channel. This is the only contract observers may rely on; nothing else
//! about the session is visible from outside the actor.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No transport. Initial state, and the state between reconnect attempts.
    Disconnected,
    /// Transport open, negotiation in flight.
    Pending,
    /// Negotiation complete, subscriptions active.
    Connected,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Pending => "pending",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Informational progress report.
    Status { text: String, detail: Option<Value> },
    /// Recoverable anomaly. Never fatal.
    Error { text: String, detail: Option<Value> },
    /// The session moved to a new state.
    State(SessionState),
    /// Payload without a group id.
    Message(Value),
    /// Payload scoped to one group.
    GroupMessage { group_id: String, payload: Value },
}

impl StreamEvent {
    pub(crate) fn status(text: impl Into<String>, detail: Option<Value>) -> Self {
        Self::Status { text: text.into(), detail }
    }

    pub(crate) fn error(text: impl Into<String>, detail: Option<Value>) -> Self {
        Self::Error { text: text.into(), detail }
    }
}

/// Receiving half of the event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<StreamEvent>;

pub(crate) type EventSender = mpsc::UnboundedSender<StreamEvent>;
