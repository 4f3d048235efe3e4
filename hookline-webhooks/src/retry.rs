//! Retry delay strategies

use crate::Webhook;
use std::time::Duration;
use uuid::Uuid;

const JITTER_RATIO: f64 = 0.25;
const FRACTION_BITS: u32 = f64::MANTISSA_DIGITS;

/// Computes how long to wait before the next attempt of a failed webhook
pub trait RetryStrategy: Send + Sync {
    fn next_delay(&self, webhook: &Webhook) -> Duration;
}

/// Exponential backoff: `initial_delay * multiplier^(attempt - 1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone)]
pub struct MultiplierRetryStrategy {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Multiplier for exponential backoff
    pub multiplier: f64,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Whether to add up to 25% jitter to delays
    pub jitter: bool,
}

impl Default for MultiplierRetryStrategy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl MultiplierRetryStrategy {
    pub fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
            jitter: false,
        }
    }

    /// Same delay between every attempt
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, 1.0, delay)
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay after the given attempt, attempt 0 counting as the first
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let base_delay = self.initial_delay.as_secs_f64()
            * self.multiplier.powi(exponent.min(i32::MAX as u32) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        let spread = if self.jitter {
            delay_secs * JITTER_RATIO * unit_fraction()
        } else {
            0.0
        };

        Duration::from_secs_f64((delay_secs + spread).max(0.0))
    }
}

impl RetryStrategy for MultiplierRetryStrategy {
    fn next_delay(&self, webhook: &Webhook) -> Duration {
        self.delay_for_attempt(webhook.current_attempt())
    }
}

/// Retries immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRetryStrategy;

impl RetryStrategy for NullRetryStrategy {
    fn next_delay(&self, _webhook: &Webhook) -> Duration {
        Duration::ZERO
    }
}

// Uniform in [0, 1), drawn from the random low bits of a v4 UUID
fn unit_fraction() -> f64 {
    let bits = Uuid::new_v4().as_u128() as u64 & ((1u64 << FRACTION_BITS) - 1);
    bits as f64 / (1u64 << FRACTION_BITS) as f64
}
