/*!
 * Retry budgets with fixed backoff schedules.
 *
 * Used for whole pipeline re-runs (30s, 2m, 10m) and for webhook
 * redelivery (5m, 30m, 2h, 8h, 16h).
 */

use std::time::Duration;

/// A retry budget and the delay before each retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before retry `n`, clamped to the last entry
    pub schedule: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, schedule: Vec<Duration>) -> Self {
        Self { max_retries, schedule }
    }

    pub fn from_secs(max_retries: u32, schedule: &[u64]) -> Self {
        Self::new(max_retries, schedule.iter().map(|s| Duration::from_secs(*s)).collect())
    }

    /// Pipeline default: three retries after 30s, 120s and 600s
    pub fn pipeline_default() -> Self {
        Self::from_secs(3, &[30, 120, 600])
    }

    /// Webhook default: five retries from 5 minutes up to 16 hours
    pub fn webhook_default() -> Self {
        Self::from_secs(5, &[300, 1800, 7200, 28800, 57600])
    }

    /// Delay after the failure of attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.schedule.is_empty() {
            return Duration::ZERO;
        }
        let index = (attempt as usize).min(self.schedule.len() - 1);
        self.schedule[index]
    }

    /// Delay before the next attempt, or `None` once the budget is spent
    pub fn next_retry(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            None
        } else {
            Some(self.delay_for(attempt))
        }
    }
}
