//! Cancellable timers that fire back into the session inbox.
//!
//! A [`Timer`] owns its task; dropping it aborts the task. Every firing
//! carries the timer's id, and the session only acts when that id still
//! matches the timer it holds, so a firing that raced a cancellation is a
//! no-op.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::session::Input;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Reconnect,
    HandshakeRetry,
    Liveness,
}

impl TimerKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Reconnect => "reconnect",
            Self::HandshakeRetry => "handshake_retry",
            Self::Liveness => "liveness",
        }
    }
}

pub(crate) struct Timer {
    id: u64,
    task: JoinHandle<()>,
}

impl Timer {
    /// Fire once after `delay`.
    pub(crate) fn once(id: u64, kind: TimerKind, delay: Duration, inbox: mpsc::UnboundedSender<Input>) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(Input::Timer { kind, id });
        });
        Self { id, task }
    }

    /// Fire every `period`, first firing one period from now.
    pub(crate) fn every(id: u64, kind: TimerKind, period: Duration, inbox: mpsc::UnboundedSender<Input>) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if inbox.send(Input::Timer { kind, id }).is_err() {
                    break;
                }
            }
        });
        Self { id, task }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// True when `slot` holds the timer identified by `id`.
pub(crate) fn is_current(slot: Option<&Timer>, id: u64) -> bool {
    slot.is_some_and(|timer| timer.id() == id)
}
