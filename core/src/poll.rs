//! Poll cadence and retry budget for job status checks.

use std::time::Duration;

use crate::config::{PollingConfig, RetryConfig};
use crate::error::ApiError;

/// How often to check job status, and for how long.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    max_wait: Option<Duration>,
}

impl PollPolicy {
    /// Fixed delay between checks, no wall-clock limit.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            multiplier: 1.0,
            max_interval: interval,
            max_wait: None,
        }
    }

    /// Grow the delay by `multiplier` after every check, up to `max_interval`.
    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.multiplier = multiplier.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    /// Stop polling after `max_wait` in total.
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    /// Delay to wait after the `checks`-th status check (1-based).
    pub fn delay_after(&self, checks: u32) -> Duration {
        if self.multiplier <= 1.0 {
            return self.interval;
        }
        let exponent = checks.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.interval.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        let max_wait = (config.max_wait_secs > 0).then(|| Duration::from_secs(config.max_wait_secs));
        Self::fixed(Duration::from_millis(config.interval_ms))
            .with_backoff(
                config.backoff_multiplier,
                Duration::from_millis(config.max_interval_ms),
            )
            .with_max_wait(max_wait)
    }
}

/// Bounded retry of transient failures on idempotent requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether to retry after `attempt` retries have already been spent.
    pub fn should_retry(&self, attempt: u32, error: &ApiError) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        error.is_transient()
    }

    /// Delay before retry number `attempt` (0-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(multiplier)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.base_delay_ms))
    }
}
