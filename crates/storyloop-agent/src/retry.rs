use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{GenerationError, GenerationOutput, GenerationRequest, TextGenerator};

/// Per-call timeout and bounded retry with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// Deadline for each attempt (None = rely on the backend)
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            call_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Delay after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Wraps any generator with the retry policy
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn attempt(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GenerationOutput, GenerationError> {
        match self.policy.call_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.generate(request))
                .await
                .unwrap_or(Err(GenerationError::Timeout(limit))),
            None => self.inner.generate(request).await,
        }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GenerationOutput, GenerationError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(request).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.backoff_for(attempt);
                    warn!(
                        backend = self.inner.name(),
                        model = request.model,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Generation failed, not retrying");
                    return Err(e);
                }
            }
        }
    }
}
