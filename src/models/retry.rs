use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: u64,
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2,
            jitter_ratio: 0.0,
        }
    }
}

impl RetryConfig {
    /// Base delay to wait after the given failed attempt (1-based), before
    /// jitter: `initial * multiplier^(attempt-1)`, capped at `max_delay_ms`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_multiplier.saturating_pow(exponent);
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);

        Duration::from_millis(delay_ms)
    }
}

/// Per-message retry bookkeeping. Lives only for one retry cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<String>,
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempt: 1,
            last_error: None,
        }
    }

    pub fn record_failure(&mut self, error: impl ToString) {
        self.last_error = Some(error.to_string());
    }

    pub fn advance(&mut self) {
        self.attempt += 1;
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule_doubles() {
        let config = RetryConfig::default();

        assert_eq!(config.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_for(2), Duration::from_millis(2000));
        assert_eq!(config.backoff_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_delay_ms: 2500,
            ..RetryConfig::default()
        };

        assert_eq!(config.backoff_for(3), Duration::from_millis(2500));
        assert_eq!(config.backoff_for(40), Duration::from_millis(2500));
    }

    #[test]
    fn test_retry_state_tracks_last_error() {
        let mut state = RetryState::new();
        assert_eq!(state.attempt, 1);

        state.record_failure("boom");
        state.advance();

        assert_eq!(state.attempt, 2);
        assert_eq!(state.last_error.as_deref(), Some("boom"));
    }
}
