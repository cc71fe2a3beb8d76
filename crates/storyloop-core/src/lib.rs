mod category;
mod classifier;
mod controller;
mod error;
mod generator;
mod loop_runner;
mod outcome;
mod prompts;
mod reviser;
mod session;

pub use category::{strategy_for, Category, GENERIC_STRATEGY};
pub use classifier::{
    parse_category, Classification, Classifier, ClassifyError, CLASSIFY_TEMPERATURE,
};
pub use controller::{decide, Decision, FLOOR_SCORE};
pub use error::LoopError;
pub use generator::{Draft, StoryGenerator, GENERATE_TEMPERATURE};
pub use loop_runner::StoryLoop;
pub use outcome::{StopReason, StoryOutcome, TweakOutcome};
pub use prompts::StoryPrompts;
pub use reviser::{Revision, RevisionInput, Reviser, REVISE_TEMPERATURE, TWEAK_TEMPERATURE};
pub use session::{
    ModelIds, RoundRecord, Session, SessionConfig, DEFAULT_MAX_ROUNDS, DEFAULT_MODEL,
    DEFAULT_PASS_MARK,
};
