//! Exponential backoff with jitter for status polling

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::BackoffConfig;
use crate::error::ConfigError;

/// Computes successive poll waits.
///
/// Waits grow by `multiplier` per attempt from `initial_wait`, get up to
/// `jitter * base` added on top, and are capped at `max_wait`. The returned
/// sequence never decreases.
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    rng: StdRng,
    attempt: u32,
    last_wait: Duration,
}

impl BackoffPolicy {
    /// Create a new policy seeded from OS entropy
    pub fn new(config: BackoffConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Create a policy with a deterministic jitter sequence
    pub fn with_seed(config: BackoffConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_rng(config, StdRng::seed_from_u64(seed)))
    }

    /// `config` must already have passed [`BackoffConfig::validate`]
    pub(crate) fn from_validated(config: BackoffConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    fn with_rng(config: BackoffConfig, rng: StdRng) -> Self {
        Self { config, rng, attempt: 0, last_wait: Duration::ZERO }
    }

    /// Wait to apply before the next poll
    pub fn next_wait(&mut self) -> Duration {
        let initial = self.config.initial_wait_ms as f64;
        let ceiling = self.config.max_wait_ms as f64;

        let base = (initial * self.config.multiplier.powi(self.attempt as i32)).min(ceiling);
        let jitter = if self.config.jitter > 0.0 {
            self.rng.gen_range(0.0..=self.config.jitter) * base
        } else {
            0.0
        };

        let candidate = Duration::from_millis((base + jitter).min(ceiling) as u64);
        let wait = candidate.max(self.last_wait);

        self.attempt = self.attempt.saturating_add(1);
        self.last_wait = wait;
        wait
    }

    /// Restore the initial state
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last_wait = Duration::ZERO;
    }

    /// Number of waits handed out since creation or the last reset
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}
