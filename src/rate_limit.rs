//! Fixed-interval pacing for outbound provider requests.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;

/// Spaces consecutive turns at least `min_interval` apart.
///
/// One pacer is shared by every lookup in the process; turns requested from
/// several threads are granted one at a time.
pub struct RequestPacer {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    clock: DefaultClock,
    min_interval: Duration,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));
        Self {
            limiter,
            clock: DefaultClock::default(),
            min_interval,
        }
    }

    /// A pacer that never waits.
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Blocks until the next request may start, then claims that turn.
    pub fn wait_turn(&self) {
        let Some(limiter) = self.limiter.as_ref() else {
            return;
        };
        while let Err(not_until) = limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            debug!("Request pacer: waiting {}ms for next turn", wait.as_millis());
            // Sleep at least 1ms so a zero wait cannot spin.
            std::thread::sleep(wait.max(Duration::from_millis(1)));
        }
    }
}
