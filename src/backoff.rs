//! Reconnect backoff (spec §4.5): exponential with a configured base, cap,
//! and jitter. Grounded in the decorrelated-jitter retry loop of
//! `iGentAI-ferrous`'s replication client
//! (`other_examples/b9d231a6_iGentAI-ferrous__src-replication-client.rs.rs`),
//! adapted from "retry a replication stream" to "retry a client connection".

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base: Duration,
    pub cap: Duration,
    /// Maximum reconnect attempts before a waiting request gives up (spec §4.5:
    /// "a request that waited longer than `connect_timeout × max_reconnect_attempts`
    /// fails").
    pub max_reconnect_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            base: Duration::from_millis(50),
            cap: Duration::from_secs(10),
            max_reconnect_attempts: 10,
        }
    }
}

/// Tracks attempt count and produces the next delay. Not `Clone`: each
/// reconnect loop owns exactly one, reset on a successful connection.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Backoff { config, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.config.max_reconnect_attempts
    }

    /// Returns the delay before the next attempt and advances the counter.
    /// Exponential growth capped at `cap`, with full jitter (uniform in
    /// `[0, computed_delay]`) to avoid synchronized reconnect storms across
    /// many client instances.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(32);
        self.attempt += 1;
        let exp_ms = self
            .config
            .base
            .as_millis()
            .saturating_mul(1u128 << exponent.min(20));
        let capped_ms = exp_ms.min(self.config.cap.as_millis());
        let jittered_ms = rand::thread_rng().gen_range(0..=capped_ms.max(1)) as u64;
        Duration::from_millis(jittered_ms)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_cap() {
        let config = BackoffConfig {
            base: Duration::from_millis(10),
            cap: Duration::from_millis(100),
            max_reconnect_attempts: 20,
        };
        let mut backoff = Backoff::new(config.clone());
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= config.cap, "delay {delay:?} exceeded cap {:?}", config.cap);
        }
    }

    #[test]
    fn exhausted_after_max_attempts() {
        let config = BackoffConfig {
            base: Duration::from_millis(1),
            cap: Duration::from_millis(10),
            max_reconnect_attempts: 3,
        };
        let mut backoff = Backoff::new(config);
        assert!(!backoff.exhausted());
        for _ in 0..3 {
            backoff.next_delay();
        }
        assert!(backoff.exhausted());
    }

    #[test]
    fn reset_clears_attempt_counter() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
    }
}
