//! Exponential backoff settings for failed network calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration for exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound of the delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Factor applied to the delay after each consecutive failure.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Starts a fresh backoff sequence.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            config: self.clone(),
            current: None,
        }
    }
}

/// Stateful delay sequence: `initial`, `initial * m`, ... capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    current: Option<Duration>,
}

impl Backoff {
    /// Returns the delay to wait before the next attempt and advances.
    pub fn next_delay(&mut self) -> Duration {
        let max = self.config.max_delay();
        let delay = match self.current {
            None => self.config.initial_delay().min(max),
            Some(previous) => previous
                .mul_f64(self.config.backoff_multiplier.max(1.0))
                .min(max),
        };
        self.current = Some(delay);
        delay
    }

    /// Forgets previous failures.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
