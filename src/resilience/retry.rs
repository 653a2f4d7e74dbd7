use std::time::Duration;
use tracing::debug;

/// Retry configuration for one logical upstream call
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, and the fixed delay for non-credential failures
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for escalating backoff
    pub multiplier: f64,
    /// Maximum jitter as percentage of delay
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1, // 10% jitter
        }
    }
}

impl RetryConfig {
    /// Single attempt, no waiting
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Config with tiny delays, for driving the retry loop against mock servers
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts were made
    #[must_use]
    pub const fn has_budget(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Escalating delay used after a credential was rotated; `attempt` is 1-based
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay_ms = self.initial_delay.as_millis() as f64;
        let exponential_delay_ms = base_delay_ms * self.multiplier.powi(exponent);
        let capped_delay_ms = exponential_delay_ms.min(self.max_delay.as_millis() as f64);
        let delay = Duration::from_millis(capped_delay_ms as u64);

        add_jitter(delay, self.jitter)
    }

    /// Fixed delay used for ordinary upstream failures
    #[must_use]
    pub fn fixed_delay(&self) -> Duration {
        add_jitter(self.initial_delay.min(self.max_delay), self.jitter)
    }
}

/// Add jitter to delay
fn add_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }

    use rand::Rng;
    let mut rng = rand::thread_rng();
    let jitter_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
    let jitter = rng.gen_range(0..=jitter_ms);

    debug!("Adding {}ms jitter to {:?} retry delay", jitter, delay);
    delay + Duration::from_millis(jitter)
}
