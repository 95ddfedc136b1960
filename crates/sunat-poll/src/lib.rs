//! Polling schedules for ticket resolution.
//!
//! This crate provides the timing policy used when waiting for an
//! asynchronously processed submission to reach a terminal state:
//! - A bounded attempt budget (the caller stops polling once spent)
//! - An initial delay before the first status fetch
//! - A fixed interval between subsequent fetches
//!
//! The schedule is deliberately fixed-interval: a single client polling a
//! ticket endpoint gains nothing from jitter, and evenly spaced cycles keep
//! the total wait predictable for operators.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use sunat_poll::PollPolicy;
//!
//! let policy = PollPolicy::default();
//! assert_eq!(policy.delay_before(1), Duration::from_secs(1));
//! assert_eq!(policy.delay_before(2), Duration::from_secs(2));
//!
//! // A tighter schedule for tests or impatient callers.
//! let quick = PollPolicy {
//!     max_attempts: 3,
//!     initial_delay: Duration::from_millis(50),
//!     interval: Duration::from_millis(100),
//! };
//! assert_eq!(quick.max_wait(), Duration::from_millis(250));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing policy for a bounded status-polling loop.
///
/// `max_attempts` counts status fetches, including the first one. Attempt
/// `1` is preceded by `initial_delay`; every later attempt is preceded by
/// `interval`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Maximum number of status fetches before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first status fetch. The remote side rarely finishes
    /// processing faster than this, so polling immediately just burns a cycle.
    #[serde(default = "default_initial_delay")]
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Fixed delay between consecutive status fetches.
    #[serde(default = "default_interval")]
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_interval() -> Duration {
    Duration::from_secs(2)
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            interval: default_interval(),
        }
    }
}

impl PollPolicy {
    /// Delay to sleep before the given 1-indexed attempt.
    ///
    /// Attempt `0` is treated as attempt `1` so a miscounted caller waits
    /// the initial delay rather than panicking or spinning.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            self.initial_delay
        } else {
            self.interval
        }
    }

    /// Upper bound on total time spent sleeping if every attempt is used.
    ///
    /// Useful for telling an operator how long a full poll can take; actual
    /// wall time also includes the network round-trips themselves.
    pub fn max_wait(&self) -> Duration {
        if self.max_attempts == 0 {
            return Duration::ZERO;
        }
        self.initial_delay
            .saturating_add(self.interval.saturating_mul(self.max_attempts - 1))
    }

    /// Whether the budget permits the given 1-indexed attempt.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}
