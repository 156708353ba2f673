//! Stream actor: runs one [`Session`] on its own task.
//!
//! DESIGN
//! ======
//! The task drains a single unbounded inbox. Callers, timers, connect
//! attempts and the per-connection event forwarder all post into it, so the
//! session sees one ordered stream of inputs and needs no locks. Callers
//! only hold a [`StreamHandle`]; events come back on an [`EventReceiver`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::StreamConfig;
use crate::event::EventReceiver;
use crate::session::{Input, Session};
use crate::transport::{Connector, WsConnector};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream has stopped")]
    Stopped,
}

/// Entry point for starting a stream.
pub struct PushStream;

impl PushStream {
    /// Spawn the session task on the current tokio runtime.
    ///
    /// The session starts `disconnected`; call [`StreamHandle::connect`].
    pub fn spawn(config: StreamConfig, connector: Arc<dyn Connector>) -> (StreamHandle, EventReceiver) {
        let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel::<Input>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut session = Session::new(config, connector, inbox_tx.clone(), events_tx);
        let task = tokio::spawn(async move {
            while let Some(input) = inbox_rx.recv().await {
                if session.handle(input).is_break() {
                    break;
                }
            }
            info!("stream: stopped");
        });

        (StreamHandle { inbox: inbox_tx, task: Arc::new(task) }, events_rx)
    }

    /// [`PushStream::spawn`] over a real websocket.
    pub fn spawn_ws(config: StreamConfig) -> (StreamHandle, EventReceiver) {
        Self::spawn(config, Arc::new(WsConnector))
    }
}

/// Cloneable control handle for a running stream.
#[derive(Clone)]
pub struct StreamHandle {
    inbox: mpsc::UnboundedSender<Input>,
    task: Arc<JoinHandle<()>>,
}

impl StreamHandle {
    /// Open the connection. No-op while connecting or connected.
    ///
    /// Also re-enables automatic reconnects after [`StreamHandle::disconnect`].
    pub fn connect(&self) -> Result<(), StreamError> {
        self.post(Input::Connect)
    }

    /// Close the connection and stop all retries until the next `connect`.
    pub fn disconnect(&self) -> Result<(), StreamError> {
        self.post(Input::Disconnect)
    }

    /// Disconnect and stop the session task.
    pub fn shutdown(&self) -> Result<(), StreamError> {
        self.post(Input::Shutdown)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    fn post(&self, input: Input) -> Result<(), StreamError> {
        self.inbox.send(input).map_err(|_| StreamError::Stopped)
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;
