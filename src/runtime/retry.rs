//! Retry with exponential backoff
//!
//! Delay before retry `n` (1-based) is `backoff_ms * multiplier^(n-1)`,
//! capped at `max_backoff_ms`. No jitter: runs are reproducible.

use std::time::Duration;

use crate::ast::RetrySpec;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting the initial attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (2.0 doubles the delay each time)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySpec::new(3))
    }
}

impl From<&RetrySpec> for RetryConfig {
    fn from(spec: &RetrySpec) -> Self {
        Self {
            max_retries: spec.retries,
            initial_delay: Duration::from_millis(spec.backoff_ms),
            max_delay: Duration::from_millis(spec.max_backoff_ms),
            backoff_multiplier: spec.multiplier,
        }
    }
}

impl RetryConfig {
    /// No retries: one attempt only
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_document_defaults() {
        let config = RetryConfig::from(&RetrySpec::new(2));
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_millis(10_000));
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.max_attempts(), 3);
    }

    #[test]
    fn exponential_backoff() {
        let config = RetryConfig::from(&RetrySpec::new(5));
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig::from(
            &RetrySpec::new(20)
                .with_backoff_ms(1000)
                .with_multiplier(10.0)
                .with_max_backoff_ms(5000),
        );
        assert_eq!(config.delay_for(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for(2), Duration::from_millis(5000));
        assert_eq!(config.delay_for(15), Duration::from_millis(5000));
    }

    #[test]
    fn none_is_single_attempt() {
        assert_eq!(RetryConfig::none().max_attempts(), 1);
    }
}
