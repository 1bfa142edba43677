//! Politeness gate shared by every request to the source
//!
//! All fetches, from listing pages, detail pages and cover images alike, go
//! through one [`RateGate`]. Consecutive request starts are spaced by at least
//! the configured interval no matter how many workers are running.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive request starts
#[derive(Debug)]
pub struct RateGate {
    interval: Duration,

    /// Start time of the most recent request, None before the first one
    last: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a request may start, then claims that slot
    ///
    /// The lock is held while sleeping, so waiters are released one interval
    /// apart in the order they arrived. Returns the claimed start time.
    pub async fn acquire(&self) -> Instant {
        let mut last = self.last.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::trace!("Politeness wait {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let now = Instant::now();
        *last = Some(now);
        now
    }
}
