//! Liveness monitor: periodic transport probes while connected.
//!
//! The probe only surfaces half-open connections early. A probe that cannot
//! be issued is treated exactly like a transport close.

use serde_json::Value;
use tracing::{debug, warn};

use crate::event::{SessionState, StreamEvent};
use crate::session::Session;
use crate::timer::{Timer, TimerKind};

impl Session {
    pub(crate) fn start_liveness(&mut self) {
        let id = self.next_id();
        let period = self.config.timings.ping_interval;
        debug!(period_ms = period.as_millis(), "liveness: started");
        self.liveness = Some(Timer::every(id, TimerKind::Liveness, period, self.inbox.clone()));
    }

    pub(crate) fn stop_liveness(&mut self) {
        if self.liveness.take().is_some() {
            debug!("liveness: stopped");
        }
    }

    pub(crate) fn on_liveness_tick(&mut self) {
        if self.state != SessionState::Connected {
            self.stop_liveness();
            return;
        }
        if let Err(error) = self.probe() {
            warn!(error = %error, "liveness: probe failed");
            self.emit(StreamEvent::error(
                "Failed to ping. Reconnecting...",
                Some(Value::String(error.to_string())),
            ));
            self.lose_connection();
        }
    }
}
