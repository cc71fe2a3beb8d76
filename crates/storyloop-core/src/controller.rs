//! Routing policy applied after every judge verdict.
//!
//! Pure function of the report, the round count and the session config; it
//! never looks at story text.

use storyloop_judge::{JudgeReport, RubricDimension};

use crate::outcome::StopReason;
use crate::session::SessionConfig;

/// Score a floor dimension must reach before the average matters
pub const FLOOR_SCORE: f64 = 4.0;

/// What the loop does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Revise,
    Stop(StopReason),
}

impl Decision {
    /// Get a short description of the decision for logging
    pub fn short_description(&self) -> String {
        match self {
            Decision::Revise => "REVISE".to_string(),
            Decision::Stop(reason) => format!("STOP ({})", reason),
        }
    }
}

/// Decide, in precedence order:
/// 1. round cap reached -> stop
/// 2. any critical failure -> stop
/// 3. any floor dimension below 4 -> revise
/// 4. weighted score below the pass mark -> revise
/// 5. otherwise -> stop, passed
pub fn decide(report: &JudgeReport, rounds: usize, config: &SessionConfig) -> Decision {
    if rounds >= config.max_rounds {
        return Decision::Stop(StopReason::ExhaustedRounds);
    }

    if report.has_critical_failures() {
        return Decision::Stop(StopReason::CriticalFailure);
    }

    let below_floor = RubricDimension::ALL
        .iter()
        .filter(|d| d.is_floor())
        .any(|d| report.score(*d) < FLOOR_SCORE);
    if below_floor {
        return Decision::Revise;
    }

    if report.weighted_score < config.pass_mark {
        return Decision::Revise;
    }

    Decision::Stop(StopReason::Passed)
}
