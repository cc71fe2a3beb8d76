use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storyloop_agent::{GenerationError, GenerationOutput, GenerationRequest, TextGenerator};
use storyloop_core::{
    Category, LoopError, ModelIds, SessionConfig, StopReason, StoryLoop, StoryPrompts,
};
use storyloop_judge::{JudgePrompts, JudgeReport, BAD_JSON_REASON};
use storyloop_logging::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Classify,
    Generate,
    Judge,
    Revise,
}

#[derive(Debug, Clone)]
struct Call {
    step: Step,
    model: String,
    payload: String,
    temperature: f32,
}

/// Fake backend that answers each step from a script
struct ScriptedGenerator {
    classifier_reply: Mutex<Result<String, GenerationError>>,
    draft: String,
    judge_replies: Mutex<VecDeque<String>>,
    reviser_error: Mutex<Option<GenerationError>>,
    interrupt_on_judge: Option<Arc<AtomicBool>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGenerator {
    fn new(category: &str) -> Self {
        Self {
            classifier_reply: Mutex::new(Ok(format!(r#"{{"category": "{}"}}"#, category))),
            draft: "Once upon a time, Sam learned to share.".to_string(),
            judge_replies: Mutex::new(VecDeque::new()),
            reviser_error: Mutex::new(None),
            interrupt_on_judge: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_judge_reports(self, reports: &[JudgeReport]) -> Self {
        let replies = reports
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect::<Vec<_>>();
        self.with_judge_replies(replies)
    }

    fn with_judge_replies(self, replies: Vec<String>) -> Self {
        *self.judge_replies.lock().unwrap() = replies.into();
        self
    }

    fn with_classifier_error(self, error: GenerationError) -> Self {
        *self.classifier_reply.lock().unwrap() = Err(error);
        self
    }

    fn with_reviser_error(self, error: GenerationError) -> Self {
        *self.reviser_error.lock().unwrap() = Some(error);
        self
    }

    fn interrupting(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt_on_judge = Some(flag);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, step: Step) -> usize {
        self.calls().iter().filter(|c| c.step == step).count()
    }

    fn step_for(request: &GenerationRequest<'_>) -> Step {
        if request.role_instruction == JudgePrompts::SYSTEM {
            Step::Judge
        } else if request.role_instruction == StoryPrompts::REVISER_SYSTEM {
            Step::Revise
        } else if request.role_instruction == StoryPrompts::STORY_SYSTEM {
            Step::Generate
        } else {
            Step::Classify
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GenerationOutput, GenerationError> {
        let step = Self::step_for(request);
        let revisions_so_far = self.count(Step::Revise);
        self.calls.lock().unwrap().push(Call {
            step,
            model: request.model.to_string(),
            payload: request.user_payload.to_string(),
            temperature: request.temperature,
        });

        let text = match step {
            Step::Classify => match &*self.classifier_reply.lock().unwrap() {
                Ok(reply) => reply.clone(),
                Err(GenerationError::MissingCredentials(m)) => {
                    return Err(GenerationError::MissingCredentials(m.clone()))
                }
                Err(e) => return Err(GenerationError::Transport(e.to_string())),
            },
            Step::Generate => self.draft.clone(),
            Step::Judge => {
                if let Some(flag) = &self.interrupt_on_judge {
                    flag.store(true, Ordering::SeqCst);
                }
                self.judge_replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| "I loved it!".to_string())
            }
            Step::Revise => {
                if let Some(e) = self.reviser_error.lock().unwrap().take() {
                    return Err(e);
                }
                format!("Revised story #{}", revisions_so_far + 1)
            }
        };

        Ok(GenerationOutput::new(
            text,
            request.model.to_string(),
            Duration::from_millis(1),
        ))
    }
}

fn story_loop(backend: &ScriptedGenerator) -> StoryLoop<'_> {
    StoryLoop::new(backend, Arc::new(Logger::silent()))
}

const SHARING_REQUEST: &str = "a story about a boy who learns to share";

#[tokio::test]
async fn test_first_draft_passes() {
    let backend =
        ScriptedGenerator::new("friendship").with_judge_reports(&[JudgeReport::uniform(4.8)]);

    let outcome = story_loop(&backend)
        .run(SHARING_REQUEST, SessionConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Passed);
    assert_eq!(outcome.rounds, 0);
    assert_eq!(outcome.category, Category::Friendship);
    assert_eq!(outcome.story, backend.draft);
    assert_eq!(outcome.judge_report.weighted_score, 4.8);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(backend.count(Step::Revise), 0);

    let steps: Vec<Step> = backend.calls().iter().map(|c| c.step).collect();
    assert_eq!(steps, vec![Step::Classify, Step::Generate, Step::Judge]);
}

#[tokio::test]
async fn test_one_revision_then_pass() {
    let low = JudgeReport::uniform(3.2).with_fixes(vec!["Add a clearer ending".into()]);
    let backend = ScriptedGenerator::new("friendship")
        .with_judge_reports(&[low, JudgeReport::uniform(4.6)]);

    let outcome = story_loop(&backend)
        .run(SHARING_REQUEST, SessionConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Passed);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.story, "Revised story #1");
    assert_eq!(backend.count(Step::Revise), 1);
    assert_eq!(backend.count(Step::Judge), 2);

    let revise = backend
        .calls()
        .into_iter()
        .find(|c| c.step == Step::Revise)
        .unwrap();
    assert!(revise.payload.contains("Add a clearer ending"));
    assert!(revise.payload.contains(&backend.draft));
    assert_eq!(revise.temperature, 0.23);

    assert_eq!(outcome.history.len(), 2);
    assert_eq!(outcome.history[0].decision, "REVISE");
    assert_eq!(outcome.history[1].decision, "STOP (passed)");
}

#[tokio::test]
async fn test_critical_failure_stops_immediately() {
    let report = JudgeReport::uniform(2.0)
        .with_critical_failures(vec!["unsafe behavior endorsed".into()]);
    let backend = ScriptedGenerator::new("adventure").with_judge_reports(&[report.clone()]);

    let outcome = story_loop(&backend)
        .run("a daring climb", SessionConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::CriticalFailure);
    assert_eq!(outcome.rounds, 0);
    assert_eq!(outcome.judge_report, report);
    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(backend.count(Step::Revise), 0);
}

#[tokio::test]
async fn test_flagged_failure_in_incomplete_report_still_stops() {
    let flagged = JudgeReport::uniform(2.0)
        .with_critical_failures(vec!["unsafe behavior endorsed".into()]);
    let mut reply = serde_json::to_value(&flagged).unwrap();
    reply.as_object_mut().unwrap().remove("praise");
    let backend = ScriptedGenerator::new("adventure").with_judge_replies(vec![reply.to_string()]);

    let outcome = story_loop(&backend)
        .run("a daring climb", SessionConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::CriticalFailure);
    assert_eq!(outcome.rounds, 0);
    assert_eq!(
        outcome.judge_report.critical_failures,
        vec!["unsafe behavior endorsed"]
    );
    assert!(outcome.judge_report.is_fallback());
    assert_eq!(backend.count(Step::Revise), 0);
}

#[tokio::test]
async fn test_unreadable_judge_exhausts_rounds() {
    let backend = ScriptedGenerator::new("silly_fun")
        .with_judge_replies(vec!["Five stars!".to_string(); 8]);

    let outcome = story_loop(&backend)
        .run("a dancing teapot", SessionConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::ExhaustedRounds);
    assert_eq!(outcome.rounds, 7);
    assert_eq!(outcome.judge_report, JudgeReport::fallback());
    assert_eq!(outcome.judge_report.fail_reasons, vec![BAD_JSON_REASON]);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(backend.count(Step::Revise), 7);
    assert_eq!(backend.count(Step::Judge), 8);
}

#[tokio::test]
async fn test_unknown_category_uses_custom_names_strategy() {
    let backend =
        ScriptedGenerator::new("unknown_label").with_judge_reports(&[JudgeReport::uniform(4.9)]);

    let outcome = story_loop(&backend)
        .run("Mia and her pet turtle Zip", SessionConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.category, Category::CustomNames);
    let generate = backend
        .calls()
        .into_iter()
        .find(|c| c.step == Step::Generate)
        .unwrap();
    assert!(generate.payload.contains("Mia and her pet turtle Zip"));
    assert!(generate.payload.contains(Category::CustomNames.strategy()));
    assert_eq!(generate.temperature, 0.4);
}

#[tokio::test]
async fn test_rounds_never_exceed_cap() {
    for max_rounds in 0..=3 {
        let backend = ScriptedGenerator::new("mystery_cozy")
            .with_judge_reports(&vec![JudgeReport::uniform(2.0); max_rounds + 1]);
        let config = SessionConfig::default().with_max_rounds(max_rounds);

        let outcome = story_loop(&backend)
            .run("the case of the missing mitten", config)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::ExhaustedRounds);
        assert_eq!(outcome.rounds, max_rounds);
        assert_eq!(backend.count(Step::Revise), max_rounds);
        assert_eq!(backend.count(Step::Judge), max_rounds + 1);
    }
}

#[tokio::test]
async fn test_empty_request_makes_no_calls() {
    let backend = ScriptedGenerator::new("friendship");
    let result = story_loop(&backend)
        .run("   ", SessionConfig::default())
        .await;

    assert!(matches!(result, Err(LoopError::EmptyRequest)));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let backend = ScriptedGenerator::new("friendship");
    let config = SessionConfig::default().with_pass_mark(9.0);
    let result = story_loop(&backend).run(SHARING_REQUEST, config).await;

    assert!(matches!(result, Err(LoopError::ConfigError(_))));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_classifier_transport_error_falls_back() {
    let backend = ScriptedGenerator::new("friendship")
        .with_classifier_error(GenerationError::Transport("connection reset".into()))
        .with_judge_reports(&[JudgeReport::uniform(4.7)]);

    let outcome = story_loop(&backend)
        .run(SHARING_REQUEST, SessionConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.category, Category::CustomNames);
    assert!(outcome.passed());
}

#[tokio::test]
async fn test_missing_credentials_abort_the_session() {
    let backend = ScriptedGenerator::new("friendship")
        .with_classifier_error(GenerationError::MissingCredentials("OPENAI_API_KEY".into()));

    let err = story_loop(&backend)
        .run(SHARING_REQUEST, SessionConfig::default())
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(backend.count(Step::Generate), 0);
}

#[tokio::test]
async fn test_reviser_failure_is_returned() {
    let backend = ScriptedGenerator::new("friendship")
        .with_judge_reports(&[JudgeReport::uniform(3.0)])
        .with_reviser_error(GenerationError::Timeout(Duration::from_secs(60)));

    let result = story_loop(&backend)
        .run(SHARING_REQUEST, SessionConfig::default())
        .await;

    assert!(matches!(
        result,
        Err(LoopError::Generation(GenerationError::Timeout(_)))
    ));
    assert_eq!(backend.count(Step::Judge), 1);
}

#[tokio::test]
async fn test_interrupt_before_start() {
    let backend = ScriptedGenerator::new("friendship");
    let story_loop = story_loop(&backend);
    story_loop.interrupt_handle().store(true, Ordering::SeqCst);

    let result = story_loop.run(SHARING_REQUEST, SessionConfig::default()).await;

    assert!(matches!(result, Err(LoopError::Interrupted)));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_interrupt_between_rounds_keeps_last_story() {
    let flag = Arc::new(AtomicBool::new(false));
    let backend = ScriptedGenerator::new("friendship")
        .with_judge_reports(&[JudgeReport::uniform(3.0)])
        .interrupting(flag.clone());

    let outcome = story_loop(&backend)
        .with_interrupt_handle(flag)
        .run(SHARING_REQUEST, SessionConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Interrupted);
    assert_eq!(outcome.rounds, 0);
    assert_eq!(outcome.story, backend.draft);
    assert_eq!(outcome.judge_report.weighted_score, 3.0);
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(backend.count(Step::Revise), 0);
}

#[tokio::test]
async fn test_tweak_makes_exactly_two_calls() {
    let backend = ScriptedGenerator::new("friendship")
        .with_judge_reports(&[JudgeReport::uniform(2.5)]);

    let outcome = story_loop(&backend)
        .tweak(
            "Once upon a time, Sam learned to share.",
            "Make the dog purple",
            &ModelIds::default(),
        )
        .await
        .unwrap();

    let steps: Vec<Step> = backend.calls().iter().map(|c| c.step).collect();
    assert_eq!(steps, vec![Step::Revise, Step::Judge]);
    assert_eq!(outcome.story, "Revised story #1");
    assert_eq!(outcome.judge_report.weighted_score, 2.5);

    let revise = &backend.calls()[0];
    assert!(revise.payload.contains("Make the dog purple"));
    assert_eq!(revise.temperature, 0.2);
}

#[tokio::test]
async fn test_empty_tweak_makes_no_calls() {
    let backend = ScriptedGenerator::new("friendship");
    let result = story_loop(&backend)
        .tweak("A finished story.", "  ", &ModelIds::default())
        .await;

    assert!(matches!(result, Err(LoopError::EmptyTweak)));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_tweak_on_empty_story_is_rejected() {
    let backend = ScriptedGenerator::new("friendship");
    let result = story_loop(&backend)
        .tweak("", "Add a rainbow", &ModelIds::default())
        .await;

    assert!(matches!(result, Err(LoopError::EmptyStory)));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_each_step_uses_its_own_model() {
    let backend =
        ScriptedGenerator::new("friendship").with_judge_reports(&[JudgeReport::uniform(4.8)]);
    let models = ModelIds {
        classify: "classify-model".into(),
        generate: "generate-model".into(),
        judge: "judge-model".into(),
        revise: "revise-model".into(),
    };

    let outcome = story_loop(&backend)
        .run(SHARING_REQUEST, SessionConfig::default().with_models(models))
        .await
        .unwrap();

    assert!(outcome.passed());
    let calls = backend.calls();
    let models: Vec<&str> = calls.iter().map(|c| c.model.as_str()).collect();
    assert_eq!(models, vec!["classify-model", "generate-model", "judge-model"]);
    assert_eq!(calls[2].temperature, 0.0);
}
