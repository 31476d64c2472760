use crate::error::{Error, Result};
use core::time::Duration;

/// Tuning knobs of the fan-out worker pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of worker tasks.
    pub num_workers: usize,
    /// Batches each worker can hold before `dispatch` starts shedding.
    pub queue_capacity: usize,
    /// Followers per batch.
    pub batch_size: usize,
    /// Attempts per job, including the first.
    pub max_attempts: u32,
    /// Upper bound for a single attempt.
    pub job_timeout: Duration,
    /// Delay before the first retry; doubles on every further retry.
    pub backoff_base: Duration,
    /// Ceiling for the retry delay.
    pub backoff_max: Duration,
    /// How long `shutdown` waits for queued batches before dropping them.
    pub drain_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get().clamp(1, 16),
            queue_capacity: 1024,
            batch_size: 50,
            max_attempts: 3,
            job_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(2),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl DispatcherConfig {
    /// Rejects settings the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.num_workers == 0 {
            "num_workers must be greater than zero"
        } else if self.queue_capacity == 0 {
            "queue_capacity must be greater than zero"
        } else if self.batch_size == 0 {
            "batch_size must be greater than zero"
        } else if self.max_attempts == 0 {
            "max_attempts must be greater than zero"
        } else if self.job_timeout.is_zero() {
            "job_timeout must be greater than zero"
        } else if self.backoff_base > self.backoff_max {
            "backoff_base must not exceed backoff_max"
        } else {
            return Ok(());
        };
        Err(Error::InvalidConfig {
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());
        assert!((1..=16).contains(&config.num_workers));
    }

    #[test]
    fn rejects_unusable_settings() {
        let zero_batch = DispatcherConfig {
            batch_size: 0,
            ..DispatcherConfig::default()
        };
        assert!(matches!(
            zero_batch.validate(),
            Err(Error::InvalidConfig { .. })
        ));

        let inverted = DispatcherConfig {
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(1),
            ..DispatcherConfig::default()
        };
        assert!(inverted.validate().is_err());
    }
}
