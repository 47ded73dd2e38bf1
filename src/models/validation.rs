use async_trait::async_trait;

use crate::error::PipelineError;

/// The retryable processing step the worker runs before any side effect.
/// Each call is one attempt and must be safe to repeat.
#[async_trait]
pub trait MessageValidator: Send + Sync {
    async fn validate(&self, payload: &str) -> Result<(), PipelineError>;
}

/// Content check run on every attempt. Payloads containing the poison
/// pattern are rejected; an empty pattern accepts everything.
#[derive(Debug, Clone)]
pub struct ContentValidator {
    poison_pattern: String,
}

impl ContentValidator {
    pub fn new(poison_pattern: impl Into<String>) -> Self {
        Self {
            poison_pattern: poison_pattern.into(),
        }
    }

    pub fn check(&self, payload: &str) -> Result<(), PipelineError> {
        if !self.poison_pattern.is_empty() && payload.contains(&self.poison_pattern) {
            return Err(PipelineError::Validation(format!(
                "Payload matches poison pattern '{}'",
                self.poison_pattern
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl MessageValidator for ContentValidator {
    async fn validate(&self, payload: &str) -> Result<(), PipelineError> {
        self.check(payload)
    }
}
