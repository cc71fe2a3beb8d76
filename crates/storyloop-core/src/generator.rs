use std::time::Duration;
use storyloop_agent::{GenerationRequest, TextGenerator};
use storyloop_logging::StepRole;
use tracing::debug;

use crate::category::{strategy_for, Category};
use crate::error::LoopError;
use crate::prompts::StoryPrompts;

/// Drafts get more sampling variability than judging or classifying
pub const GENERATE_TEMPERATURE: f32 = 0.4;

/// A first-draft story
#[derive(Debug, Clone)]
pub struct Draft {
    pub text: String,
    pub duration: Duration,
}

/// Produces the first draft from the request and category directive
pub struct StoryGenerator<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> StoryGenerator<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    pub async fn draft(
        &self,
        request: &str,
        category: Option<Category>,
        model: &str,
    ) -> Result<Draft, LoopError> {
        let payload = StoryPrompts::build_story_payload(request, strategy_for(category));
        let call = GenerationRequest::new(model, StoryPrompts::STORY_SYSTEM, &payload)
            .with_temperature(GENERATE_TEMPERATURE);

        debug!(model, category = ?category, "Generating draft");
        let output = self.generator.generate(&call).await?;

        if output.is_blank() {
            return Err(LoopError::EmptyOutput(StepRole::Generator));
        }

        Ok(Draft {
            text: output.text,
            duration: output.duration,
        })
    }
}
