use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spaces quote requests a fixed interval apart, success or failure.
/// The upstream gateway throttles callers that burst, so the loop waits
/// here before every fetch; the first permit of a run is immediate.
pub struct RequestPacer {
    limiter: DirectRateLimiter,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        let period = interval.max(Duration::from_millis(1));
        let quota =
            Quota::with_period(period).expect("pacing period is always greater than zero");

        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait until the next request is allowed out.
    pub async fn pause(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_permit_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_millis(400));
        assert!(pacer.limiter.check().is_ok());
    }

    #[test]
    fn second_permit_is_deferred_within_interval() {
        let pacer = RequestPacer::new(Duration::from_secs(60));
        let _ = pacer.limiter.check();
        assert!(pacer.limiter.check().is_err());
    }

    #[tokio::test]
    async fn paces_consecutive_requests() {
        let pacer = RequestPacer::new(Duration::from_millis(30));
        let start = std::time::Instant::now();
        pacer.pause().await;
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
