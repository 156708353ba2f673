//! In-memory transport used by session and stream tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::transport::{Connection, Connector, Link, TransportError, TransportEvent, WireFrame};

/// Test-side view of one opened link.
#[derive(Clone)]
pub(crate) struct MockLink {
    sent: Arc<Mutex<Vec<String>>>,
    probes: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    fail_probe: Arc<AtomicBool>,
    fail_send: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MockLink {
    /// Every message sent so far, one JSON object per outgoing frame.
    pub(crate) fn sent(&self) -> Vec<Value> {
        let sent = self.sent.lock().expect("sent lock");
        sent.iter()
            .map(|text| {
                let value = serde_json::from_str::<Value>(text).expect("sent frame is JSON");
                let batch = value.as_array().expect("sent frame is an array");
                assert_eq!(batch.len(), 1, "one message per frame");
                batch[0].clone()
            })
            .collect()
    }

    pub(crate) fn sent_on(&self, channel: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|message| message["channel"] == channel)
            .collect()
    }

    pub(crate) fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_probes(&self) {
        self.fail_probe.store(true, Ordering::SeqCst);
    }

    /// Make every later write fail without the link reporting a close.
    pub(crate) fn fail_sends(&self) {
        self.fail_send.store(true, Ordering::SeqCst);
    }

    /// Deliver a text frame from the "server".
    pub(crate) fn push_text(&self, text: &str) {
        self.events
            .send(TransportEvent::Frame(WireFrame::Text(text.to_owned())))
            .expect("link events open");
    }

    pub(crate) fn push(&self, event: TransportEvent) {
        self.events.send(event).expect("link events open");
    }

    /// Simulate the server closing the socket.
    pub(crate) fn server_close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.push(TransportEvent::Closed { code: Some(1006), reason: "gone".to_owned() });
    }
}

struct MockConnection {
    link: MockLink,
}

impl Connection for MockConnection {
    fn send(&self, text: String) -> Result<(), TransportError> {
        if self.link.is_closed() || self.link.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::NotOpen);
        }
        self.link.sent.lock().expect("sent lock").push(text);
        Ok(())
    }

    fn probe(&self) -> Result<(), TransportError> {
        if self.link.is_closed() || self.link.fail_probe.load(Ordering::SeqCst) {
            return Err(TransportError::NotOpen);
        }
        self.link.probes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.link.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockState {
    attempts: usize,
    failures_left: usize,
    links: Vec<MockLink>,
}

/// Connector handing out [`MockLink`]s, optionally failing the first N attempts.
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub(crate) fn failing(times: usize) -> Self {
        let connector = Self::default();
        connector.state.lock().expect("mock lock").failures_left = times;
        connector
    }

    pub(crate) fn attempts(&self) -> usize {
        self.state.lock().expect("mock lock").attempts
    }

    pub(crate) fn links(&self) -> usize {
        self.state.lock().expect("mock lock").links.len()
    }

    pub(crate) fn link(&self, index: usize) -> MockLink {
        self.state.lock().expect("mock lock").links[index].clone()
    }

    pub(crate) fn last_link(&self) -> MockLink {
        let state = self.state.lock().expect("mock lock");
        state.links.last().cloned().expect("at least one link")
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Link, TransportError> {
        let mut state = self.state.lock().expect("mock lock");
        state.attempts += 1;
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(TransportError::Connect(Box::new(
                tokio_tungstenite::tungstenite::Error::ConnectionClosed,
            )));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let link = MockLink {
            sent: Arc::new(Mutex::new(Vec::new())),
            probes: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            fail_probe: Arc::new(AtomicBool::new(false)),
            fail_send: Arc::new(AtomicBool::new(false)),
            events: events_tx,
        };
        state.links.push(link.clone());
        Ok(Link { connection: Box::new(MockConnection { link }), events: events_rx })
    }
}

// =============================================================================
// SERVER REPLIES
// =============================================================================

pub(crate) fn handshake_ok(client_id: &str) -> String {
    format!(r#"[{{"channel":"/meta/handshake","successful":true,"clientId":"{client_id}","version":"1.0"}}]"#)
}

pub(crate) fn handshake_rejected() -> String {
    r#"[{"channel":"/meta/handshake","successful":false,"error":"403::Handshake denied"}]"#.to_owned()
}

pub(crate) fn subscribe_ok(subscription: &str) -> String {
    format!(r#"[{{"channel":"/meta/subscribe","successful":true,"subscription":"{subscription}"}}]"#)
}

pub(crate) fn subscribe_rejected(subscription: &str) -> String {
    format!(r#"[{{"channel":"/meta/subscribe","successful":false,"subscription":"{subscription}","error":"401::Unauthorized"}}]"#)
}

pub(crate) fn client_id_expired() -> String {
    r#"[{"channel":"/meta/connect","successful":false,"error":"ClientID_Expired"}]"#.to_owned()
}
