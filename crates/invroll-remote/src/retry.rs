//! Backoff schedule for rate-limited calls.

use std::time::Duration;

use backon::ExponentialBuilder;
use invroll_core::models::config::DelegateConfig;

/// Exponential backoff with a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DelegateConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &DelegateConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// `base_delay * 2^attempt`, capped at `max_delay`, for `max_retries`
    /// attempts.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries as usize)
    }

    /// Replace a scheduled delay with the server's `Retry-After`, capped at
    /// `max_delay`. An exhausted schedule stays exhausted.
    pub fn adjust(&self, scheduled: Option<Duration>, retry_after: Option<Duration>) -> Option<Duration> {
        scheduled.map(|delay| retry_after.map_or(delay, |hint| hint.min(self.max_delay)))
    }
}
