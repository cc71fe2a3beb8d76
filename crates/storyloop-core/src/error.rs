use storyloop_logging::StepRole;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Text generation error: {0}")]
    Generation(#[from] storyloop_agent::GenerationError),

    #[error("Judge error: {0}")]
    Judge(#[from] storyloop_judge::EvaluationError),

    #[error("The {0} returned empty text")]
    EmptyOutput(StepRole),

    #[error("Story request is empty")]
    EmptyRequest,

    #[error("Story to tweak is empty")]
    EmptyStory,

    #[error("Tweak request is empty")]
    EmptyTweak,

    #[error("Session was interrupted before a story was judged")]
    Interrupted,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LoopError {
    /// Faults that no retry or new session will fix
    pub fn is_fatal(&self) -> bool {
        match self {
            LoopError::Generation(e) => e.is_fatal(),
            LoopError::Judge(_) | LoopError::ConfigError(_) => true,
            _ => false,
        }
    }
}
