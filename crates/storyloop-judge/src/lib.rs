pub mod evaluator;
mod prompts;
pub mod repair;
mod report;
mod rubric;

pub use evaluator::{EvaluationError, JudgeEvaluator, JudgeVerdict, JUDGE_TEMPERATURE};
pub use prompts::JudgePrompts;
pub use report::{JudgeReport, ReportError, BAD_JSON_REASON};
pub use rubric::{Rubric, RubricDimension, MAX_SCORE, MIN_SCORE};
