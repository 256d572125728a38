//! Minimum-interval pacing for outbound requests.
//!
//! The Dados Abertos API throttles aggressive clients, so every outbound
//! call in the process must be spaced by a minimum interval, globally. The
//! pacer owns the "time of last request" marker behind a tokio Mutex; the
//! slot returned by [`RequestPacer::acquire`] keeps the lock held while the
//! caller's HTTP request is in flight, so concurrent callers serialize.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Paces outbound requests to at least `min_interval` apart.
///
/// One instance is owned per [`crate::Client`]; tests construct their own
/// isolated instance and drive it with `tokio::time::pause`.
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

/// Exclusive permission to issue one request.
///
/// Holds the pacer lock until dropped. Call [`PacerSlot::mark`] once the
/// request has been issued (whether it succeeded or not) so the interval is
/// enforced across retries too.
pub struct PacerSlot<'a> {
    last: MutexGuard<'a, Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Waits until the minimum interval since the previous request has
    /// elapsed, then returns the exclusive slot. The first request is not
    /// delayed.
    pub async fn acquire(&self) -> PacerSlot<'_> {
        let last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        PacerSlot { last }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl PacerSlot<'_> {
    /// Records now as the time of the last outbound request.
    pub fn mark(&mut self) {
        *self.last = Some(Instant::now());
    }
}
