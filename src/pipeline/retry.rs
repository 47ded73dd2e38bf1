use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::models::retry::{RetryConfig, RetryState};

/// Result of running a payload through the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Supervised<T, O = ()> {
    Succeeded { value: T, attempts: u32 },
    Recovered { attempts: u32, recovery: O },
}

/// Last failure of a retry cycle that ran out of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub error: E,
}

/// Runs a processing step with bounded attempts and exponential backoff.
///
/// Every attempt re-runs the step from scratch, so the step must be safe to
/// repeat. Backoff uses `tokio::time::sleep` and only suspends the calling
/// task.
#[derive(Debug, Clone)]
pub struct RetrySupervisor {
    config: RetryConfig,
}

impl RetrySupervisor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs `process` against `payload`; when every attempt fails, hands the
    /// original payload and the last error to `recover` and stops.
    pub async fn supervise<T, E, O, P, PFut, R, RFut>(
        &self,
        payload: &str,
        process: P,
        recover: R,
    ) -> Supervised<T, O>
    where
        P: Fn(String) -> PFut,
        PFut: Future<Output = Result<T, E>>,
        E: Display,
        R: FnOnce(String, E) -> RFut,
        RFut: Future<Output = O>,
    {
        match self.attempt(|| process(payload.to_string())).await {
            Ok((value, attempts)) => Supervised::Succeeded { value, attempts },
            Err(exhausted) => {
                let recovery = recover(payload.to_string(), exhausted.error).await;
                Supervised::Recovered {
                    attempts: exhausted.attempts,
                    recovery,
                }
            }
        }
    }

    /// Retry loop without a recovery hook. Returns the value with the attempt
    /// number it succeeded on, or the last error once attempts run out.
    pub async fn attempt<F, Fut, T, E>(&self, operation: F) -> Result<(T, u32), Exhausted<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut state = RetryState::new();

        loop {
            match operation().await {
                Ok(result) => {
                    if state.attempt > 1 {
                        info!(attempt = state.attempt, max_attempts, "Retry succeeded");
                    }
                    return Ok((result, state.attempt));
                }
                Err(e) => {
                    state.record_failure(&e);

                    if state.attempt >= max_attempts {
                        warn!(
                            max_attempts,
                            error = %e,
                            "Retry failed after exhausting all attempts"
                        );
                        return Err(Exhausted {
                            attempts: state.attempt,
                            error: e,
                        });
                    }

                    let delay = self.delay_after(state.attempt);

                    debug!(
                        attempt = state.attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        last_error = state.last_error.as_deref().unwrap_or_default(),
                        "Retry attempt failed, backing off"
                    );

                    sleep(delay).await;
                    state.advance();
                }
            }
        }
    }

    /// Backoff after a failed attempt. Jitter only ever lengthens the delay.
    fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_for(attempt);

        if self.config.jitter_ratio <= 0.0 {
            return base;
        }

        let jitter = rand::random_range(0.0..=self.config.jitter_ratio);
        base.mul_f64(1.0 + jitter)
    }
}

impl Default for RetrySupervisor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
