//! Protocol negotiation: handshake, subscriptions, connect/listen.
//!
//! SEQUENCE
//! ========
//! 1. handshake → server assigns a client id
//! 2. subscribe to `/user/{id}`
//! 3. subscribe to each `/group/{id}` (fire-and-forget, config order)
//! 4. connect/listen → session becomes `connected`
//!
//! Each step waits for the previous response. A rejected handshake is
//! re-sent after a fixed delay, forever. A rejected user subscription is
//! reported and left alone: it is usually an auth problem that a retry will
//! not fix. Group acknowledgements are not tracked; a rejection is reported
//! and nothing else changes.
//!
//! An expired client id restarts at step 1 on the same connection. The state
//! stays `connected` and probing continues while the new id is negotiated,
//! so a server that never answers is still caught by the liveness monitor.

use frames::Message;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::event::{SessionState, StreamEvent};
use crate::session::Session;
use crate::timer::{Timer, TimerKind};

impl Session {
    pub(crate) fn handshake(&mut self) {
        self.send(Message::handshake());
    }

    /// Handshake retry timer fired.
    pub(crate) fn retry_handshake(&mut self) {
        if !self.has_connection() || self.client_id.is_some() {
            debug!("negotiator: handshake retry no longer needed");
            return;
        }
        info!("negotiator: retrying handshake");
        self.handshake();
    }

    pub(crate) fn on_handshake_response(&mut self, successful: bool, client_id: Option<String>, error: Option<String>) {
        match (successful, client_id) {
            (true, Some(client_id)) => {
                info!(%client_id, "negotiator: handshake succeeded");
                self.handshake_retry = None;
                self.client_id = Some(client_id);
                self.emit(StreamEvent::status("Handshake succeeded!", None));
                self.subscribe_user();
            }
            (true, None) => {
                warn!("negotiator: handshake succeeded without a client id");
                self.handshake_failed(Some("missing clientId".to_owned()));
            }
            (false, _) => self.handshake_failed(error),
        }
    }

    fn handshake_failed(&mut self, error: Option<String>) {
        warn!(error = ?error, "negotiator: handshake rejected");
        self.emit(StreamEvent::error("Handshake failed! Retrying...", error.map(Value::String)));
        let id = self.next_id();
        let delay = self.config.timings.handshake_retry_delay;
        self.handshake_retry = Some(Timer::once(id, TimerKind::HandshakeRetry, delay, self.inbox.clone()));
    }

    fn subscribe_user(&mut self) {
        let Some(client_id) = self.client_id.clone() else {
            return;
        };
        let message = Message::subscribe(&client_id, &self.user_topic, &self.config.access_token, frames::now_ms());
        self.send(message);
    }

    fn subscribe_groups(&mut self) {
        let Some(client_id) = self.client_id.clone() else {
            return;
        };
        let timestamp = frames::now_ms();
        let messages = self
            .config
            .group_ids
            .iter()
            .map(|group_id| {
                Message::subscribe(
                    &client_id,
                    &frames::group_topic(group_id),
                    &self.config.access_token,
                    timestamp,
                )
            })
            .collect::<Vec<_>>();
        for message in messages {
            if !self.has_connection() {
                return;
            }
            self.send(message);
        }
    }

    fn start_listening(&mut self) {
        let Some(client_id) = self.client_id.clone() else {
            return;
        };
        if !self.has_connection() {
            return;
        }
        self.send(Message::connect(&client_id));
        if !self.has_connection() {
            return;
        }
        self.listening = true;
        self.set_state(SessionState::Connected);
        if self.liveness.is_none() {
            self.start_liveness();
        }
    }

    pub(crate) fn on_subscribe_response(
        &mut self,
        successful: bool,
        subscription: Option<String>,
        error: Option<String>,
    ) {
        let is_user = match subscription.as_deref() {
            Some(topic) => topic == self.user_topic,
            None => !self.listening,
        };

        if !is_user {
            if successful {
                debug!(subscription = ?subscription, "negotiator: group subscribed");
            } else {
                warn!(subscription = ?subscription, error = ?error, "negotiator: group subscribe rejected");
                self.emit(StreamEvent::error(
                    "Subscribing to group failed!",
                    Some(json!({ "subscription": subscription, "error": error })),
                ));
            }
            return;
        }

        if !successful {
            warn!(error = ?error, "negotiator: user subscribe rejected");
            self.emit(StreamEvent::error("Subscribing to user failed!", error.map(Value::String)));
            return;
        }
        if self.listening {
            debug!("negotiator: duplicate user subscribe ack");
            return;
        }
        if self.client_id.is_none() {
            debug!("negotiator: user subscribe ack without a client id");
            return;
        }

        info!(groups = self.config.group_ids.len(), "negotiator: user subscribed");
        self.emit(StreamEvent::status("Subscribed", Some(Value::String(self.user_topic.clone()))));
        self.subscribe_groups();
        self.start_listening();
    }

    pub(crate) fn on_session_expired(&mut self) {
        warn!("negotiator: client id expired");
        self.emit(StreamEvent::error("ClientID expired. Initiating new handshake.", None));
        self.client_id = None;
        self.listening = false;
        self.handshake_retry = None;
        self.handshake();
    }
}
