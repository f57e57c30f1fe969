//! Rate-limited store reconnection
//!
//! The store is re-checked at every tick boundary. While it is down, one
//! reconnect attempt is made per interval; the first attempt after the loss
//! is immediate. Nothing here blocks, so the loop keeps serving peers (and
//! observing shutdown) between attempts.

use chrono::Duration;
use fgtracker_core::Timestamp;
use fgtracker_ports::FlightStore;
use log::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Store was up; nothing to do
    Connected,
    /// Store was down and is back
    Restored,
    /// Attempt made and failed
    Failed,
    /// Store down, next attempt not due yet
    Waiting,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    interval: Duration,
    last_attempt: Option<Timestamp>,
}

impl ReconnectPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reconnect the store if it is down and an attempt is due
    pub fn maybe_reconnect(
        &mut self,
        store: &mut dyn FlightStore,
        now: Timestamp,
    ) -> ReconnectOutcome {
        if store.is_connected() {
            self.last_attempt = None;
            return ReconnectOutcome::Connected;
        }
        if let Some(last) = self.last_attempt {
            if now - last < self.interval {
                return ReconnectOutcome::Waiting;
            }
        }

        self.last_attempt = Some(now);
        match store.reconnect() {
            Ok(()) => {
                info!("Store connection restored");
                self.last_attempt = None;
                ReconnectOutcome::Restored
            }
            Err(e) => {
                error!(
                    "Store reconnect failed, next attempt in {} seconds: {}",
                    self.interval.num_seconds(),
                    e
                );
                ReconnectOutcome::Failed
            }
        }
    }
}
