//! Configuration for the append, poll and offset engines.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Engine configuration, as found under `[log]` in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub append: RetryConfig,

    #[serde(default)]
    pub offsets: OffsetConfig,

    #[serde(default)]
    pub poll: PollConfig,
}

impl LogConfig {
    /// Set the append retry budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.append.max_attempts = attempts;
        self
    }

    /// Set the backoff bounds used between append attempts.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.append.initial_backoff = initial;
        self.append.max_backoff = max;
        self
    }

    /// Set how commits that move a checkpoint backwards are handled.
    #[must_use]
    pub fn with_regression_policy(mut self, policy: RegressionPolicy) -> Self {
        self.offsets.regression = policy;
        self
    }

    /// Cap the number of entries returned per key by a poll.
    #[must_use]
    pub fn with_max_poll_entries(mut self, max: usize) -> Self {
        self.poll.max_entries = Some(max);
        self
    }
}

/// Attempt budget and backoff shared by appends and offset commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts (read + compare-and-swap) before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound on the delay between attempts.
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Growth factor applied per failed attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    64
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_millis(100)
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Upper bound of the delay after failed attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_us =
            self.initial_backoff.as_micros() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_micros(delay_us.min(self.max_backoff.as_micros() as f64) as u64)
    }

    /// Delay after failed attempt `attempt`, jittered into `[d/2, d]`.
    ///
    /// Jitter keeps contending writers from retrying in lockstep.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let ceiling = self.delay_for_attempt(attempt);
        let micros = ceiling.as_micros() as u64;
        if micros < 2 {
            return ceiling;
        }
        Duration::from_micros(rand::thread_rng().gen_range(micros.div_ceil(2)..=micros))
    }
}

/// How a commit below the stored checkpoint is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionPolicy {
    /// Keep the stored maximum and report success.
    #[default]
    Clamp,
    /// Fail the commit with `offset-regression`.
    Reject,
}

/// Offset checkpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetConfig {
    #[serde(default)]
    pub regression: RegressionPolicy,
}

/// Poll settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Maximum entries returned per key; unlimited when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}
