use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use storyloop_judge::{JudgeReport, MAX_SCORE, MIN_SCORE};
use uuid::Uuid;

use crate::category::Category;
use crate::error::LoopError;

pub const DEFAULT_PASS_MARK: f64 = 4.5;
pub const DEFAULT_MAX_ROUNDS: usize = 7;
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Model identifier for each step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelIds {
    pub classify: String,
    pub generate: String,
    pub judge: String,
    pub revise: String,
}

impl ModelIds {
    /// Same model for every step
    pub fn uniform(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            classify: model.clone(),
            generate: model.clone(),
            judge: model.clone(),
            revise: model,
        }
    }
}

impl Default for ModelIds {
    fn default() -> Self {
        Self::uniform(DEFAULT_MODEL)
    }
}

/// Per-session tuning of strictness and cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub pass_mark: f64,
    pub max_rounds: usize,
    pub models: ModelIds,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pass_mark: DEFAULT_PASS_MARK,
            max_rounds: DEFAULT_MAX_ROUNDS,
            models: ModelIds::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_pass_mark(mut self, pass_mark: f64) -> Self {
        self.pass_mark = pass_mark;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_models(mut self, models: ModelIds) -> Self {
        self.models = models;
        self
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if !self.pass_mark.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&self.pass_mark) {
            return Err(LoopError::ConfigError(format!(
                "pass mark must be within [{}, {}], got {}",
                MIN_SCORE, MAX_SCORE, self.pass_mark
            )));
        }

        let models = [
            ("classify", &self.models.classify),
            ("generate", &self.models.generate),
            ("judge", &self.models.judge),
            ("revise", &self.models.revise),
        ];
        for (step, model) in models {
            if model.trim().is_empty() {
                return Err(LoopError::ConfigError(format!(
                    "model for the {} step is empty",
                    step
                )));
            }
        }

        Ok(())
    }
}

/// One judged version of the story
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    pub story: String,
    pub judge_report: JudgeReport,
    pub decision: String,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of one story request
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// Original request text
    pub request: String,
    pub category: Option<Category>,
    /// Current story text (empty until the first draft)
    pub story: String,
    /// Most recent judge report
    pub judge_report: Option<JudgeReport>,
    /// Completed revision cycles
    pub rounds: usize,
    pub config: SessionConfig,
    pub history: Vec<RoundRecord>,
    started_at: Instant,
}

impl Session {
    pub fn new(request: String, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            category: None,
            story: String::new(),
            judge_report: None,
            rounds: 0,
            config,
            history: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// A session that starts from an existing story (used for tweaks)
    pub fn seeded(story: String, config: SessionConfig) -> Self {
        Self {
            story,
            ..Self::new(String::new(), config)
        }
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = Some(category);
    }

    /// Install the first draft. Does not count as a round.
    pub fn set_draft(&mut self, story: String) {
        self.story = story;
    }

    /// Replace the story with a revision; one revision is one round.
    pub fn apply_revision(&mut self, story: String) {
        self.story = story;
        self.rounds += 1;
    }

    pub fn record_verdict(&mut self, report: JudgeReport, decision: String) {
        self.history.push(RoundRecord {
            round: self.rounds,
            story: self.story.clone(),
            judge_report: report.clone(),
            decision,
            timestamp: Utc::now(),
        });
        self.judge_report = Some(report);
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}
