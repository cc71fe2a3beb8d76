use std::time::Duration;
use storyloop_agent::{GenerationRequest, TextGenerator};
use storyloop_logging::StepRole;
use tracing::debug;

use crate::error::LoopError;
use crate::prompts::StoryPrompts;

/// Enough variability to rephrase, not enough to lose structure
pub const REVISE_TEMPERATURE: f32 = 0.23;
/// Ad hoc tweaks stay a little closer to the current text
pub const TWEAK_TEMPERATURE: f32 = 0.2;

/// What the reviser works from
#[derive(Debug, Clone, Copy)]
pub struct RevisionInput<'a> {
    pub story: &'a str,
    pub fixes: &'a [String],
    pub praise: &'a [String],
}

/// A replacement story
#[derive(Debug, Clone)]
pub struct Revision {
    pub text: String,
    pub duration: Duration,
}

/// Rewrites a story to address fixes while keeping praised elements
pub struct Reviser<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> Reviser<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    pub async fn revise(
        &self,
        input: RevisionInput<'_>,
        model: &str,
        temperature: f32,
    ) -> Result<Revision, LoopError> {
        let payload = StoryPrompts::build_revision_payload(input.story, input.fixes, input.praise);
        let call = GenerationRequest::new(model, StoryPrompts::REVISER_SYSTEM, &payload)
            .with_temperature(temperature);

        debug!(
            model,
            fixes = input.fixes.len(),
            praise = input.praise.len(),
            "Revising story"
        );
        let output = self.generator.generate(&call).await?;

        if output.is_blank() {
            return Err(LoopError::EmptyOutput(StepRole::Reviser));
        }

        Ok(Revision {
            text: output.text,
            duration: output.duration,
        })
    }
}
