use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use storyloop_agent::TextGenerator;
use storyloop_judge::{JudgeEvaluator, JudgeReport, JudgeVerdict};
use storyloop_logging::{LogEvent, Logger, StepRole};

use crate::classifier::Classifier;
use crate::controller::{decide, Decision};
use crate::error::LoopError;
use crate::generator::StoryGenerator;
use crate::outcome::{StopReason, StoryOutcome, TweakOutcome};
use crate::reviser::{RevisionInput, Reviser, REVISE_TEMPERATURE, TWEAK_TEMPERATURE};
use crate::session::{ModelIds, Session, SessionConfig};

/// Orchestrates the classify -> generate -> judge -> (revise -> judge)* loop
pub struct StoryLoop<'a> {
    generator: &'a dyn TextGenerator,
    logger: Arc<Logger>,
    interrupted: Arc<AtomicBool>,
}

impl<'a> StoryLoop<'a> {
    pub fn new(generator: &'a dyn TextGenerator, logger: Arc<Logger>) -> Self {
        Self {
            generator,
            logger,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an existing interruption flag, e.g. one owned by a signal handler
    pub fn with_interrupt_handle(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Run a story session until it passes, hits the round cap, or is
    /// stopped by a critical failure.
    pub async fn run(
        &self,
        request: &str,
        config: SessionConfig,
    ) -> Result<StoryOutcome, LoopError> {
        config.validate()?;
        if request.trim().is_empty() {
            return Err(LoopError::EmptyRequest);
        }

        let mut session = Session::new(request.to_string(), config);
        info!(session_id = %session.id, "Story session started");
        self.logger.log(&LogEvent::SessionStarted {
            request: session.request.clone(),
            pass_mark: session.config.pass_mark,
            max_rounds: session.config.max_rounds,
        });

        // CLASSIFY
        if self.is_interrupted() {
            return Err(LoopError::Interrupted);
        }
        let classification = Classifier::new(self.generator)
            .classify(&session.request, &session.config.models.classify)
            .await
            .inspect_err(|e| self.log_failure(0, StepRole::Classifier, e))?;
        self.logger.log(&LogEvent::Classified {
            category: classification.category.to_string(),
            fell_back: classification.fell_back(),
        });
        session.set_category(classification.category);

        // GENERATE
        if self.is_interrupted() {
            return Err(LoopError::Interrupted);
        }
        let draft = StoryGenerator::new(self.generator)
            .draft(
                &session.request,
                session.category,
                &session.config.models.generate,
            )
            .await
            .inspect_err(|e| self.log_failure(0, StepRole::Generator, e))?;
        self.logger.log(&LogEvent::DraftGenerated {
            chars: draft.text.chars().count(),
            duration_secs: draft.duration.as_secs_f64(),
        });
        session.set_draft(draft.text);

        loop {
            // JUDGE
            let verdict = self.judge(&session).await?;
            let report = verdict.report;

            let decision = decide(&report, session.rounds, &session.config);
            debug!(round = session.rounds, decision = ?decision, "Controller decision");
            self.logger.log(&LogEvent::DecisionMade {
                round: session.rounds,
                decision: decision.short_description(),
            });
            session.record_verdict(report.clone(), decision.short_description());

            match decision {
                Decision::Stop(reason) => return Ok(self.finish(session, report, reason)),
                Decision::Revise if self.is_interrupted() => {
                    info!(round = session.rounds, "Session interrupted between rounds");
                    return Ok(self.finish(session, report, StopReason::Interrupted));
                }
                Decision::Revise => {
                    // REVISE
                    let next_round = session.rounds + 1;
                    self.logger.log(&LogEvent::RevisionStarted {
                        round: next_round,
                        fixes: report.fixes.len(),
                    });
                    let input = RevisionInput {
                        story: &session.story,
                        fixes: &report.fixes,
                        praise: &report.praise,
                    };
                    let revision = Reviser::new(self.generator)
                        .revise(input, &session.config.models.revise, REVISE_TEMPERATURE)
                        .await
                        .inspect_err(|e| self.log_failure(next_round, StepRole::Reviser, e))?;
                    self.logger.log(&LogEvent::RevisionCompleted {
                        round: next_round,
                        chars: revision.text.chars().count(),
                        duration_secs: revision.duration.as_secs_f64(),
                    });
                    session.apply_revision(revision.text);
                }
            }
        }
    }

    /// Apply one user-requested change: exactly one revise -> judge cycle,
    /// with no pass mark or round cap.
    pub async fn tweak(
        &self,
        current_story: &str,
        change_request: &str,
        models: &ModelIds,
    ) -> Result<TweakOutcome, LoopError> {
        let change_request = change_request.trim();
        if change_request.is_empty() {
            return Err(LoopError::EmptyTweak);
        }
        if current_story.trim().is_empty() {
            return Err(LoopError::EmptyStory);
        }

        let config = SessionConfig::default().with_models(models.clone());
        config.validate()?;
        let mut session = Session::seeded(current_story.to_string(), config);

        let fixes = vec![change_request.to_string()];
        let input = RevisionInput {
            story: &session.story,
            fixes: &fixes,
            praise: &[],
        };
        let revision = Reviser::new(self.generator)
            .revise(input, &session.config.models.revise, TWEAK_TEMPERATURE)
            .await
            .inspect_err(|e| self.log_failure(1, StepRole::Reviser, e))?;
        session.apply_revision(revision.text);

        let verdict = self.judge(&session).await?;
        self.logger.log(&LogEvent::TweakApplied {
            change_request: change_request.to_string(),
            weighted_score: verdict.report.weighted_score,
        });

        Ok(TweakOutcome {
            story: session.story,
            judge_report: verdict.report,
        })
    }

    async fn judge(&self, session: &Session) -> Result<JudgeVerdict, LoopError> {
        let round = session.rounds;
        self.logger.log(&LogEvent::JudgeStarted { round });

        let verdict = JudgeEvaluator::new(self.generator)
            .evaluate(&session.story, &session.config.models.judge)
            .await
            .map_err(LoopError::from)
            .inspect_err(|e| self.log_failure(round, StepRole::Judge, e))?;

        if let Some(ref reason) = verdict.rejection {
            warn!(round, reason = %reason, "Judge verdict replaced by fallback report");
        }
        self.logger.log(&LogEvent::JudgeCompleted {
            round,
            weighted_score: verdict.report.weighted_score,
            critical_failures: verdict.report.critical_failures.len(),
            fallback: verdict.used_fallback(),
        });

        Ok(verdict)
    }

    fn finish(&self, session: Session, report: JudgeReport, reason: StopReason) -> StoryOutcome {
        let outcome = StoryOutcome::from_session(session, report, reason);
        info!(
            rounds = outcome.rounds,
            stop_reason = %outcome.stop_reason,
            weighted_score = outcome.judge_report.weighted_score,
            "Story session finished"
        );
        self.logger.log(&LogEvent::SessionCompleted {
            rounds: outcome.rounds,
            stop_reason: outcome.stop_reason.to_string(),
            weighted_score: outcome.judge_report.weighted_score,
            duration_secs: outcome.total_duration_secs,
        });
        outcome
    }

    fn log_failure(&self, round: usize, role: StepRole, error: &LoopError) {
        warn!(round, %role, error = %error, "Step failed");
        self.logger.log(&LogEvent::StepFailed {
            round,
            role,
            error: error.to_string(),
        });
    }
}
