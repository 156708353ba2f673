//! Transport adapter: the framed-message connection under the session.
//!
//! DESIGN
//! ======
//! The session never touches a socket. It asks a [`Connector`] for a
//! [`Link`]: a [`Connection`] for fire-and-forget sends/probes/close, plus a
//! receiver of [`TransportEvent`]s. Nothing on the connection blocks; a send
//! only fails when the connection is already gone.
//!
//! [`WsConnector`] is the production implementation over `tokio-tungstenite`.
//! Each link runs two tasks:
//! - writer: drains the outbound queue into the websocket sink
//! - reader: forwards inbound frames, then a final `Closed` event

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("connection is not open")]
    NotOpen,
}

/// One wire-level transmission unit as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame(WireFrame),
    /// Always the last event of a link.
    Closed { code: Option<u16>, reason: String },
    /// Transport-level error. A `Closed` follows if the link is lost.
    Error(String),
}

/// Live handle to an open connection.
pub trait Connection: Send {
    /// Queue one text frame.
    fn send(&self, text: String) -> Result<(), TransportError>;
    /// Queue a transport-level keepalive.
    fn probe(&self) -> Result<(), TransportError>;
    /// Start closing. Idempotent.
    fn close(&self);
}

/// An opened connection and the events it will produce.
pub struct Link {
    pub connection: Box<dyn Connection>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Link, TransportError>;
}

// =============================================================================
// WEBSOCKET
// =============================================================================

enum Outbound {
    Text(String),
    Ping,
    Close,
}

/// Production connector over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|error| TransportError::Connect(Box::new(error)))?;
        let (mut sink, mut source) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();

        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(outbound) = outbound_rx.recv().await {
                let (message, closing) = match outbound {
                    Outbound::Text(text) => (Message::Text(text.into()), false),
                    Outbound::Ping => (Message::Ping(Default::default()), false),
                    Outbound::Close => (Message::Close(None), true),
                };
                if let Err(error) = sink.send(message).await {
                    warn!(error = %error, "ws: write failed");
                    let _ = writer_events.send(TransportEvent::Error(error.to_string()));
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            let closed = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let _ = event_tx.send(TransportEvent::Frame(WireFrame::Text(text.as_str().to_owned())));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let _ = event_tx.send(TransportEvent::Frame(WireFrame::Binary(bytes.to_vec())));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => TransportEvent::Closed {
                                code: Some(u16::from(frame.code)),
                                reason: frame.reason.as_str().to_owned(),
                            },
                            None => TransportEvent::Closed { code: None, reason: String::new() },
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        let _ = event_tx.send(TransportEvent::Error(error.to_string()));
                        break TransportEvent::Closed { code: None, reason: error.to_string() };
                    }
                    None => break TransportEvent::Closed { code: None, reason: "stream ended".to_owned() },
                }
            };
            debug!(?closed, "ws: reader finished");
            let _ = event_tx.send(closed);
        });

        Ok(Link {
            connection: Box::new(WsConnection { outbound: outbound_tx, reader }),
            events: event_rx,
        })
    }
}

struct WsConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: JoinHandle<()>,
}

impl Connection for WsConnection {
    fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::NotOpen)
    }

    fn probe(&self) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Ping)
            .map_err(|_| TransportError::NotOpen)
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        // The read half keeps the socket alive until aborted.
        self.reader.abort();
    }
}
