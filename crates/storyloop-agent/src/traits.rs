use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::GenerationOutput;

/// Errors that can occur while calling the text-generation backend
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Credentials rejected by upstream (status {0})")]
    Unauthorized(u16),

    #[error("Generator configuration error: {0}")]
    ConfigError(String),

    #[error("Generation request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Configuration faults stop the process; everything else is per-call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GenerationError::MissingCredentials(_)
                | GenerationError::Unauthorized(_)
                | GenerationError::ConfigError(_)
        )
    }

    /// Whether another attempt at the same call might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Timeout(_) | GenerationError::Transport(_) => true,
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A single role-instruction + payload call to the backend
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Model identifier understood by the backend
    pub model: &'a str,
    /// System/role instruction
    pub role_instruction: &'a str,
    /// User payload
    pub user_payload: &'a str,
    /// Sampling variability (temperature)
    pub temperature: f32,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(model: &'a str, role_instruction: &'a str, user_payload: &'a str) -> Self {
        Self {
            model,
            role_instruction,
            user_payload,
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// The capability every story step talks to.
///
/// Implementations are stateless per call: each `generate` is a complete
/// request/response with no handle held between calls.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g., "OpenAI")
    fn name(&self) -> &str;

    /// Produce free-form text for the given request
    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GenerationOutput, GenerationError>;
}
