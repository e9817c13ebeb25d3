//! Exponential backoff shared by run polling and transport retries.

use std::time::Duration;

/// Tunable parameters for an exponential-backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay before the second attempt.
    pub initial_interval: Duration,
    /// Upper bound on the delay between attempts.
    pub max_interval: Duration,
    /// Factor by which the delay grows after each attempt.
    pub multiplier: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl PollConfig {
    /// Schedule used between retries of a failed transport call.
    pub fn transport_retry() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }

    /// Iterator over successive delays, starting at `initial_interval`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_interval), move |&d| {
            Some(next_delay(d, self))
        })
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`PollConfig::max_interval`].
pub fn next_delay(current: Duration, config: &PollConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_interval)
}
