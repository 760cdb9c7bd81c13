//! Reconnect retry policy.
//!
//! Exponential backoff with symmetric jitter and an optional attempt
//! ceiling.  The policy is plain data (it lives in [`AgentConfig`]); the
//! [`Backoff`] iterator owns the attempt counter and an entropy source.
//!
//! [`AgentConfig`]: crate::config::AgentConfig

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry (milliseconds).
    pub initial_ms: u32,
    /// Growth factor applied per failed attempt.
    pub multiplier: u32,
    /// Upper bound on the un-jittered delay (milliseconds).
    pub max_ms: u32,
    /// Symmetric jitter as a percentage of the delay (0-100).
    pub jitter_pct: u8,
    /// Give up after this many consecutive retries (`None` = never).
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 1_000,
            multiplier: 2,
            max_ms: 60_000,
            jitter_pct: 20,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_ms == 0 {
            return Err(ConfigError::OutOfRange("retry.initial_ms"));
        }
        if self.multiplier == 0 {
            return Err(ConfigError::OutOfRange("retry.multiplier"));
        }
        if self.max_ms < self.initial_ms {
            return Err(ConfigError::OutOfRange("retry.max_ms"));
        }
        if self.jitter_pct > 100 {
            return Err(ConfigError::OutOfRange("retry.jitter_pct"));
        }
        Ok(())
    }

    /// Un-jittered delay for the given zero-based attempt.
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let cap = u64::from(self.max_ms);
        let mut delay = u64::from(self.initial_ms).min(cap);
        for _ in 0..attempt {
            if delay >= cap {
                break;
            }
            delay = delay.saturating_mul(u64::from(self.multiplier)).min(cap);
        }
        delay
    }
}

/// Stateful backoff sequence driven by a [`RetryPolicy`].
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    attempts: u32,
    entropy: fn() -> u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_entropy(policy, platform_entropy)
    }

    /// Use a caller-supplied entropy source (tests pin it).
    pub fn with_entropy(policy: RetryPolicy, entropy: fn() -> u32) -> Self {
        Self {
            policy,
            attempts: 0,
            entropy,
        }
    }

    /// Delay before the next retry, or `None` once the ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }

        let base = self.policy.base_delay_ms(self.attempts);
        self.attempts = self.attempts.saturating_add(1);

        let span = base * u64::from(self.policy.jitter_pct) / 100;
        let ms = if span == 0 {
            base
        } else {
            let offset = u64::from((self.entropy)()) % (2 * span + 1);
            base - span + offset
        };
        Some(Duration::from_millis(ms))
    }

    /// Forget past failures; the next delay starts from `initial_ms`.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

// ── Platform entropy ─────────────────────────────────────────

/// Hardware RNG word.
#[cfg(target_os = "espidf")]
pub fn platform_entropy() -> u32 {
    // SAFETY: esp_random reads the hardware RNG register; no preconditions.
    unsafe { esp_idf_svc::sys::esp_random() }
}

/// Simulation stub: `RandomState` seeds are good enough for jitter.
#[cfg(not(target_os = "espidf"))]
pub fn platform_entropy() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    RandomState::new().build_hasher().finish() as u32
}

// ── Tests ────────────────────────────────────────────────────
