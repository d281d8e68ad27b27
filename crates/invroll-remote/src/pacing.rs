//! Minimum spacing between outbound calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::trace;

/// Reads the tokio clock, so pacing follows paused time in tests.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TokioClock;

impl Clock for TokioClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

type Limiter = RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<Instant>>;

/// Gate that lets at most one call through per `min_interval`.
///
/// Clones share the same limiter, so every holder of a clone is paced
/// together. A zero interval disables pacing.
#[derive(Clone)]
pub struct PacingGate {
    limiter: Option<Arc<Limiter>>,
    clock: TokioClock,
}

impl PacingGate {
    pub fn new(min_interval: Duration) -> Self {
        let clock = TokioClock;
        let limiter = Quota::with_period(min_interval)
            .map(|quota| Arc::new(RateLimiter::direct_with_clock(quota, clock)));
        Self { limiter, clock }
    }

    /// Wait until a call may be made, then record it.
    pub async fn wait(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };

        while let Err(not_until) = limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            trace!("Pacing: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_passes_immediately() {
        let gate = PacingGate::new(Duration::from_secs(2));
        let start = Instant::now();
        gate.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let gate = PacingGate::new(Duration::from_millis(1500));
        let start = Instant::now();
        gate.wait().await;
        gate.wait().await;
        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_limiter() {
        let gate = PacingGate::new(Duration::from_secs(1));
        let other = gate.clone();
        let start = Instant::now();
        gate.wait().await;
        other.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_interval_does_not_wait() {
        let gate = PacingGate::new(Duration::from_secs(1));
        gate.wait().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        let start = Instant::now();
        gate.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let gate = PacingGate::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            gate.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
