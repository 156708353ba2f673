//! Session state machine: the single owner of connection and protocol state.
//!
//! DESIGN
//! ======
//! `Session` is driven exclusively by [`Input`]s pulled off one inbox by the
//! stream task, so no two reactions ever overlap. Transport callbacks, timer
//! firings and caller commands all arrive through that inbox; nothing else
//! mutates the connection, the client id, or the sequence counter.
//!
//! LIFECYCLE
//! =========
//! ```text
//! disconnected --connect ok--> pending --negotiated--> connected
//!      ^                         |                         |
//!      +----- close / connect failure / probe failure -----+
//! ```
//! Leaving `connected`/`pending` for any reason other than an explicit
//! disconnect schedules a reconnect after a fixed delay.
//!
//! STALENESS
//! =========
//! Every connection attempt gets a fresh generation number. Transport events
//! and connect results carry the generation they belong to, and timers carry
//! their own id; anything that does not match what the session currently
//! holds is dropped.

use std::ops::ControlFlow;
use std::sync::Arc;

use frames::Message;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::dispatch::{DecodeError, Inbound, decode_inbound};
use crate::event::{EventSender, SessionState, StreamEvent};
use crate::timer::{Timer, TimerKind, is_current};
use crate::transport::{Connection, Connector, Link, TransportError, TransportEvent, WireFrame};

// =============================================================================
// INPUT
// =============================================================================

/// Everything the session reacts to.
pub(crate) enum Input {
    Connect,
    Disconnect,
    Shutdown,
    Connected { attempt: u64, link: Link },
    ConnectFailed { attempt: u64, error: TransportError },
    Transport { generation: u64, event: TransportEvent },
    Timer { kind: TimerKind, id: u64 },
}

impl Input {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Shutdown => "shutdown",
            Self::Connected { .. } => "connected",
            Self::ConnectFailed { .. } => "connect_failed",
            Self::Transport { .. } => "transport",
            Self::Timer { kind, .. } => kind.as_str(),
        }
    }
}

// =============================================================================
// CONNECTION SLOTS
// =============================================================================

/// A connect call in flight.
struct Attempt {
    id: u64,
    task: JoinHandle<()>,
}

impl Drop for Attempt {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The one live connection, plus the task forwarding its events.
struct ActiveLink {
    generation: u64,
    connection: Box<dyn Connection>,
    forwarder: JoinHandle<()>,
}

impl Drop for ActiveLink {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub(crate) struct Session {
    pub(crate) config: StreamConfig,
    pub(crate) user_topic: String,
    connector: Arc<dyn Connector>,
    pub(crate) inbox: mpsc::UnboundedSender<Input>,
    events: EventSender,

    pub(crate) state: SessionState,
    /// Assigned by the server on handshake; `None` before and after expiry.
    pub(crate) client_id: Option<String>,
    /// Last id stamped on an outgoing message. Never reset.
    sequence: u64,
    /// Source of connection generations and timer ids.
    next_id: u64,
    /// Set by an explicit disconnect; suppresses automatic reconnects.
    stopped: bool,
    /// Connect/listen has been sent for the current client id.
    pub(crate) listening: bool,

    attempt: Option<Attempt>,
    active: Option<ActiveLink>,

    reconnect: Option<Timer>,
    pub(crate) handshake_retry: Option<Timer>,
    pub(crate) liveness: Option<Timer>,
}

impl Session {
    pub(crate) fn new(
        config: StreamConfig,
        connector: Arc<dyn Connector>,
        inbox: mpsc::UnboundedSender<Input>,
        events: EventSender,
    ) -> Self {
        let user_topic = frames::user_topic(&config.user_id);
        Self {
            config,
            user_topic,
            connector,
            inbox,
            events,
            state: SessionState::Disconnected,
            client_id: None,
            sequence: 1,
            next_id: 0,
            stopped: false,
            listening: false,
            attempt: None,
            active: None,
            reconnect: None,
            handshake_retry: None,
            liveness: None,
        }
    }

    /// React to one input. `Break` once the session has shut down.
    pub(crate) fn handle(&mut self, input: Input) -> ControlFlow<()> {
        debug!(input = input.label(), state = %self.state, "session: input");
        match input {
            Input::Connect => self.connect(),
            Input::Disconnect => self.disconnect(),
            Input::Shutdown => {
                self.disconnect();
                return ControlFlow::Break(());
            }
            Input::Connected { attempt, link } => self.on_connected(attempt, link),
            Input::ConnectFailed { attempt, error } => self.on_connect_failed(attempt, error),
            Input::Transport { generation, event } => self.on_transport(generation, event),
            Input::Timer { kind, id } => self.on_timer(kind, id),
        }
        ControlFlow::Continue(())
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn emit(&self, event: StreamEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        info!(from = %self.state, to = %state, "session: state change");
        self.state = state;
        self.emit(StreamEvent::State(state));
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    fn connect(&mut self) {
        self.stopped = false;
        if self.state == SessionState::Connected || self.active.is_some() || self.attempt.is_some() {
            debug!(state = %self.state, "session: connect ignored, already connecting or connected");
            return;
        }
        self.reconnect = None;
        self.start_attempt();
    }

    fn disconnect(&mut self) {
        self.stopped = true;
        self.reconnect = None;
        self.attempt = None;
        self.drop_link();
        self.emit(StreamEvent::status("Sending disconnect request to server.", None));
        self.set_state(SessionState::Disconnected);
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    fn start_attempt(&mut self) {
        let id = self.next_id();
        let connector = Arc::clone(&self.connector);
        let inbox = self.inbox.clone();
        let url = self.config.url.clone();
        info!(attempt = id, %url, "session: connecting");
        let task = tokio::spawn(async move {
            let input = match connector.connect(&url).await {
                Ok(link) => Input::Connected { attempt: id, link },
                Err(error) => Input::ConnectFailed { attempt: id, error },
            };
            let _ = inbox.send(input);
        });
        self.attempt = Some(Attempt { id, task });
    }

    fn take_attempt(&mut self, id: u64) -> bool {
        if self.attempt.as_ref().is_some_and(|attempt| attempt.id == id) {
            // The task already finished; dropping only releases the handle.
            self.attempt = None;
            return true;
        }
        false
    }

    fn on_connected(&mut self, attempt: u64, link: Link) {
        if !self.take_attempt(attempt) {
            debug!(attempt, "session: stale connect result, closing");
            link.connection.close();
            return;
        }

        let Link { connection, mut events } = link;
        let inbox = self.inbox.clone();
        let generation = attempt;
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if inbox.send(Input::Transport { generation, event }).is_err() {
                    break;
                }
            }
        });
        self.active = Some(ActiveLink { generation, connection, forwarder });

        self.set_state(SessionState::Pending);
        self.emit(StreamEvent::status("Websocket Connected", None));
        self.handshake();
    }

    fn on_connect_failed(&mut self, attempt: u64, error: TransportError) {
        if !self.take_attempt(attempt) {
            debug!(attempt, "session: stale connect failure");
            return;
        }
        warn!(attempt, error = %error, "session: connect failed");
        self.set_state(SessionState::Disconnected);
        self.emit(StreamEvent::error("Connection Failed", Some(Value::String(error.to_string()))));
        self.schedule_reconnect();
    }

    fn on_transport(&mut self, generation: u64, event: TransportEvent) {
        if self.active.as_ref().map(|active| active.generation) != Some(generation) {
            debug!(generation, "session: stale transport event");
            return;
        }
        match event {
            TransportEvent::Frame(frame) => self.on_frame(&frame),
            TransportEvent::Error(error) => {
                warn!(generation, %error, "session: transport error");
                self.emit(StreamEvent::error("Websocket experienced error.", Some(Value::String(error))));
            }
            TransportEvent::Closed { code, reason } => {
                info!(generation, ?code, %reason, "session: connection closed");
                self.emit(StreamEvent::status(
                    "Websocket Disconnected.",
                    Some(json!({ "code": code, "reason": reason })),
                ));
                self.lose_connection();
            }
        }
    }

    /// Common path for close and probe failure: tear down, then retry later.
    pub(crate) fn lose_connection(&mut self) {
        self.drop_link();
        self.set_state(SessionState::Disconnected);
        self.schedule_reconnect();
    }

    /// Release the connection and everything scoped to it.
    fn drop_link(&mut self) {
        self.liveness = None;
        self.handshake_retry = None;
        self.client_id = None;
        self.listening = false;
        if let Some(active) = self.active.take() {
            active.connection.close();
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.stopped {
            return;
        }
        let id = self.next_id();
        let delay = self.config.timings.reconnect_delay;
        info!(delay_ms = delay.as_millis(), "session: reconnect scheduled");
        self.reconnect = Some(Timer::once(id, TimerKind::Reconnect, delay, self.inbox.clone()));
    }

    fn on_timer(&mut self, kind: TimerKind, id: u64) {
        match kind {
            TimerKind::Reconnect => {
                if !is_current(self.reconnect.as_ref(), id) {
                    return;
                }
                self.reconnect = None;
                if self.stopped || self.active.is_some() || self.attempt.is_some() {
                    return;
                }
                self.start_attempt();
            }
            TimerKind::HandshakeRetry => {
                if !is_current(self.handshake_retry.as_ref(), id) {
                    return;
                }
                self.handshake_retry = None;
                self.retry_handshake();
            }
            TimerKind::Liveness => {
                if is_current(self.liveness.as_ref(), id) {
                    self.on_liveness_tick();
                }
            }
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Stamp, encode and send one message. Fire-and-forget.
    ///
    /// A connection that refuses the write is treated as lost.
    pub(crate) fn send(&mut self, message: Message) {
        if self.active.is_none() {
            self.emit(StreamEvent::error("Cannot send message: connection is not open.", None));
            return;
        }

        self.sequence += 1;
        let message = message.with_id(self.sequence);
        let text = match frames::encode_frame(std::slice::from_ref(&message)) {
            Ok(text) => text,
            Err(error) => {
                self.emit(StreamEvent::error("Error sending message", Some(Value::String(error.to_string()))));
                return;
            }
        };

        debug!(channel = %message.channel, id = self.sequence, "session: send");
        self.emit(StreamEvent::status("Sending", Some(message.to_value())));

        let result = match &self.active {
            Some(active) => active.connection.send(text),
            None => Err(TransportError::NotOpen),
        };
        if let Err(error) = result {
            warn!(error = %error, "session: send failed");
            self.emit(StreamEvent::error("Error sending message", Some(Value::String(error.to_string()))));
            self.lose_connection();
        }
    }

    /// Probe the live connection.
    pub(crate) fn probe(&self) -> Result<(), TransportError> {
        match &self.active {
            Some(active) => active.connection.probe(),
            None => Err(TransportError::NotOpen),
        }
    }

    pub(crate) fn has_connection(&self) -> bool {
        self.active.is_some()
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    fn on_frame(&mut self, frame: &WireFrame) {
        let batch = match decode_inbound(frame) {
            Ok(batch) => batch,
            Err(error @ DecodeError::NotText { .. }) => {
                warn!(error = %error, "session: dropped frame");
                self.emit(StreamEvent::error("Received a non-text message.", Some(Value::String(error.to_string()))));
                return;
            }
            Err(error) => {
                warn!(error = %error, "session: dropped frame");
                self.emit(StreamEvent::error("Failed to decode frame", Some(Value::String(error.to_string()))));
                return;
            }
        };

        if let WireFrame::Text(text) = frame {
            self.emit(StreamEvent::status("Received", Some(Value::String(text.clone()))));
        }
        for inbound in batch {
            self.dispatch(inbound);
        }
    }

    fn dispatch(&mut self, inbound: Inbound) {
        debug!(kind = inbound.kind(), "session: dispatch");
        match inbound {
            Inbound::HandshakeResponse { successful, client_id, error } => {
                self.on_handshake_response(successful, client_id, error);
            }
            Inbound::SubscribeResponse { successful, subscription, error } => {
                self.on_subscribe_response(successful, subscription, error);
            }
            Inbound::SessionExpired => self.on_session_expired(),
            Inbound::GroupPayload { group_id, payload } => {
                self.emit(StreamEvent::GroupMessage { group_id, payload });
            }
            Inbound::GenericPayload(payload) => self.emit(StreamEvent::Message(payload)),
            Inbound::Rejected { error } => {
                warn!(%error, "session: dropped message");
                self.emit(StreamEvent::error("Failed to decode message", Some(Value::String(error))));
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
