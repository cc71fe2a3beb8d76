use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{GenerationError, GenerationOutput, GenerationRequest, TextGenerator};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions backend
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiClient {
    /// Build a client with an explicit key. A blank key is a configuration fault.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::MissingCredentials(format!(
                "{} is empty",
                API_KEY_ENV
            )));
        }

        Ok(Self {
            http: build_http(DEFAULT_TIMEOUT)?,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Build a client from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`
    pub fn from_env() -> Result<Self, GenerationError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            GenerationError::MissingCredentials(format!(
                "{} is not set. Export it in your shell or add it to .env",
                API_KEY_ENV
            ))
        })?;

        let client = Self::new(api_key)?;
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Ok(client.with_base_url(url)),
            _ => Ok(client),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, GenerationError> {
        self.http = build_http(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

fn build_http(timeout: Duration) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GenerationError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GenerationOutput, GenerationError> {
        let start = Instant::now();

        debug!(
            model = request.model,
            temperature = request.temperature,
            payload_len = request.user_payload.len(),
            "Sending chat completion request"
        );

        let body = ChatRequest {
            model: request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.role_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: request.user_payload,
                },
            ],
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(GenerationError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let model = parsed.model.unwrap_or_else(|| request.model.to_string());
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                GenerationError::MalformedResponse("response contained no message content".into())
            })?;

        let duration = start.elapsed();
        debug!(
            model = %model,
            duration_ms = duration.as_millis(),
            text_len = text.len(),
            "Chat completion finished"
        );

        Ok(GenerationOutput::new(text, model, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_missing_credentials() {
        let err = OpenAiClient::new("   ").err().unwrap();
        assert!(matches!(err, GenerationError::MissingCredentials(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAiClient::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "be kind",
                },
                ChatMessage {
                    role: "user",
                    content: "a story",
                },
            ],
            temperature: 0.4,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "a story");
        assert!((json["temperature"].as_f64().unwrap() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_response_parsing_tolerates_missing_model() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Hi"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.model.is_none());
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi"));
    }
}
