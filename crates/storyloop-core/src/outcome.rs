use serde::{Deserialize, Serialize};
use storyloop_judge::JudgeReport;

use crate::category::Category;
use crate::session::{RoundRecord, Session};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The story met the pass mark and both floor dimensions
    Passed,
    /// The round cap was reached first
    ExhaustedRounds,
    /// The judge flagged a hard safety violation
    CriticalFailure,
    /// The caller abandoned the session between rounds
    Interrupted,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Passed => "passed",
            StopReason::ExhaustedRounds => "exhausted_rounds",
            StopReason::CriticalFailure => "critical_failure",
            StopReason::Interrupted => "interrupted",
        }
    }

    /// Process exit code for a session that stopped for this reason
    pub fn exit_code(self) -> i32 {
        match self {
            StopReason::Passed => 0,
            StopReason::ExhaustedRounds => 1,
            StopReason::CriticalFailure => 3,
            StopReason::Interrupted => 130,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a story session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryOutcome {
    pub session_id: String,
    pub story: String,
    /// The report that triggered the stop, verbatim
    pub judge_report: JudgeReport,
    pub stop_reason: StopReason,
    pub rounds: usize,
    pub category: Category,
    #[serde(skip)]
    pub history: Vec<RoundRecord>,
    pub total_duration_secs: f64,
}

impl StoryOutcome {
    /// Close a session. The story and round count come from the session; the
    /// report is the one that triggered the stop.
    pub fn from_session(
        session: Session,
        judge_report: JudgeReport,
        stop_reason: StopReason,
    ) -> Self {
        let total_duration_secs = session.total_duration().as_secs_f64();
        Self {
            session_id: session.id.to_string(),
            story: session.story,
            judge_report,
            stop_reason,
            rounds: session.rounds,
            category: session.category.unwrap_or_default(),
            history: session.history,
            total_duration_secs,
        }
    }

    pub fn passed(&self) -> bool {
        self.stop_reason == StopReason::Passed
    }

    pub fn exit_code(&self) -> i32 {
        self.stop_reason.exit_code()
    }
}

/// Result of one ad hoc tweak
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweakOutcome {
    pub story: String,
    pub judge_report: JudgeReport,
}
