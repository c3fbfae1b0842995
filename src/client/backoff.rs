//! Reconnect backoff — exponential growth with equal jitter.
//!
//! Attempt `n` (from 0) has a ceiling of `initial_delay * 2^n`, capped at
//! `max_delay`. The actual delay is drawn uniformly from the upper half
//! of that ceiling, so retries never spin and peers that lost the same
//! server do not reconnect in lockstep.

use std::time::Duration;

use rand::Rng;

/// Bounds for the reconnect delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Start over from `initial_delay` (after a successful connect).
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.ceiling();
        self.attempt = self.attempt.saturating_add(1);

        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        let floor_ms = ceiling_ms / 2;
        Duration::from_millis(rand::thread_rng().gen_range(floor_ms..=ceiling_ms))
    }

    fn ceiling(&self) -> Duration {
        // 2^16 * initial is already past any sane max_delay.
        let factor = 1u32 << self.attempt.min(16);
        self.config
            .initial_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }
}
