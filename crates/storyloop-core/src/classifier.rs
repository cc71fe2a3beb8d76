use serde_json::Value;
use storyloop_agent::{GenerationRequest, TextGenerator};
use storyloop_judge::repair::extract_json_object;
use thiserror::Error;
use tracing::{debug, warn};

use crate::category::Category;
use crate::error::LoopError;
use crate::prompts::StoryPrompts;

pub const CLASSIFY_TEMPERATURE: f32 = 0.2;

/// Why classifier output was not usable
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("No JSON object found in classifier output")]
    NoJsonObject,

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing \"category\" key")]
    MissingCategory,

    #[error("\"category\" must be a string")]
    WrongType,

    #[error("Unknown category label: {0}")]
    UnknownCategory(String),
}

/// Parse `{"category": "<label>"}` out of raw classifier output
pub fn parse_category(output: &str) -> Result<Category, ClassifyError> {
    let json = extract_json_object(output).ok_or(ClassifyError::NoJsonObject)?;
    let value: Value = serde_json::from_str(json)?;
    let label = value
        .get("category")
        .ok_or(ClassifyError::MissingCategory)?
        .as_str()
        .ok_or(ClassifyError::WrongType)?;
    label
        .parse()
        .map_err(|_| ClassifyError::UnknownCategory(label.to_string()))
}

/// The category chosen for a request
#[derive(Debug, Clone)]
pub struct Classification {
    pub category: Category,
    /// Why the default category was used, if it was
    pub rejection: Option<String>,
}

impl Classification {
    pub fn fell_back(&self) -> bool {
        self.rejection.is_some()
    }

    fn fallback(reason: String) -> Self {
        Self {
            category: Category::default(),
            rejection: Some(reason),
        }
    }
}

/// Maps a free-text request to a category
pub struct Classifier<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> Classifier<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// Classify a request. Only configuration faults are errors; anything
    /// else yields the default category.
    pub async fn classify(&self, request: &str, model: &str) -> Result<Classification, LoopError> {
        let system = StoryPrompts::classifier_system();
        let payload = StoryPrompts::build_classifier_payload(request);
        let call = GenerationRequest::new(model, &system, &payload)
            .with_temperature(CLASSIFY_TEMPERATURE);

        let output = match self.generator.generate(&call).await {
            Ok(output) => output,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Classifier call failed, using default category");
                return Ok(Classification::fallback(e.to_string()));
            }
        };

        match parse_category(&output.text) {
            Ok(category) => {
                debug!(%category, "Request classified");
                Ok(Classification {
                    category,
                    rejection: None,
                })
            }
            Err(e) => {
                warn!(error = %e, "Classifier output rejected, using default category");
                Ok(Classification::fallback(e.to_string()))
            }
        }
    }
}
