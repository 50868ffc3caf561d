use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::RetryPolicy;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// Worth retrying: timeouts, rate limits, server hiccups.
    #[error("transient generation failure: {0}")]
    Transient(String),

    #[error("terminal generation failure: {0}")]
    Terminal(String),

    #[error("gave up after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },
}

/// Text in, text out. Prompts are rendered before they reach the generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}

/// Bounds every call with a timeout and retries transient failures with exponential backoff.
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.initial_backoff();
        let mut attempt = 1;

        loop {
            let outcome = match timeout(self.policy.call_timeout(), self.inner.generate(prompt)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(GenerationError::Transient(format!(
                    "timed out after {:?}",
                    self.policy.call_timeout()
                ))),
            };

            match outcome {
                Err(GenerationError::Transient(reason)) if attempt < max_attempts => {
                    warn!(attempt, %reason, ?backoff, "Generation failed, retrying");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(self.policy.max_backoff());
                    attempt += 1;
                }
                Err(GenerationError::Transient(reason)) => {
                    return Err(GenerationError::Exhausted {
                        attempts: attempt,
                        reason,
                    });
                }
                other => return other,
            }
        }
    }
}
