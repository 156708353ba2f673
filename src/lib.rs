//! Persistent push-channel client.
//!
//! Keeps one long-lived websocket subscription to a Bayeux-style push
//! service: negotiates a client id, subscribes to the user topic and any
//! group topics, probes the connection while idle, and reconnects on loss.
//! Inbound messages come out as typed [`StreamEvent`]s.
//!
//! ```no_run
//! # async fn run() -> Result<(), pushstream::StreamError> {
//! use pushstream::{PushStream, StreamConfig, StreamEvent};
//!
//! let config = StreamConfig::new("token", "12345", ["67890"]);
//! let (stream, mut events) = PushStream::spawn_ws(config);
//! stream.connect()?;
//! while let Some(event) = events.recv().await {
//!     if let StreamEvent::GroupMessage { group_id, payload } = event {
//!         println!("{group_id}: {payload}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod event;
mod liveness;
mod negotiator;
mod session;
pub mod stream;
mod timer;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, StreamConfig, StreamTimings};
pub use event::{EventReceiver, SessionState, StreamEvent};
pub use stream::{PushStream, StreamError, StreamHandle};
pub use transport::{Connection, Connector, Link, TransportError, TransportEvent, WireFrame, WsConnector};
