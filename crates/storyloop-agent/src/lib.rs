mod openai;
mod output;
mod retry;
mod traits;

pub use openai::{OpenAiClient, API_KEY_ENV, BASE_URL_ENV};
pub use output::GenerationOutput;
pub use retry::{RetryPolicy, RetryingGenerator};
pub use traits::{GenerationError, GenerationRequest, TextGenerator};

/// Build the default backend: OpenAI from the environment, wrapped in the retry policy.
///
/// Fails with a fatal [`GenerationError`] when credentials are missing, so callers
/// can surface it before any session starts.
pub fn create_generator(policy: RetryPolicy) -> Result<Box<dyn TextGenerator>, GenerationError> {
    let mut client = OpenAiClient::from_env()?;
    if let Some(timeout) = policy.call_timeout {
        client = client.with_timeout(timeout)?;
    }
    Ok(Box::new(RetryingGenerator::new(client, policy)))
}
