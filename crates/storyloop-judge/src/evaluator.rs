use std::time::{Duration, Instant};
use storyloop_agent::{GenerationError, GenerationRequest, TextGenerator};
use tracing::{debug, info, warn};

use crate::{JudgePrompts, JudgeReport};

/// Judging favors determinism over creativity
pub const JUDGE_TEMPERATURE: f32 = 0.0;

/// Fallback reason recorded when the backend could not be reached
pub const UPSTREAM_ERROR_REASON: &str = "upstream_error";

/// Result of one judge invocation
#[derive(Debug, Clone)]
pub struct JudgeVerdict {
    pub report: JudgeReport,
    /// Why the fallback report was substituted, if it was
    pub rejection: Option<String>,
    pub duration: Duration,
}

impl JudgeVerdict {
    pub fn used_fallback(&self) -> bool {
        self.rejection.is_some()
    }
}

/// Evaluator that runs the judge against the text-generation backend
pub struct JudgeEvaluator<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> JudgeEvaluator<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// Score a story.
    ///
    /// Unparseable output and per-call upstream failures both produce the
    /// fallback report; only configuration faults are returned as errors.
    pub async fn evaluate(
        &self,
        story: &str,
        model: &str,
    ) -> Result<JudgeVerdict, EvaluationError> {
        let start = Instant::now();
        let payload = JudgePrompts::build_evaluation_payload(story);
        let request = GenerationRequest::new(model, JudgePrompts::SYSTEM, &payload)
            .with_temperature(JUDGE_TEMPERATURE);

        debug!(model, payload_len = payload.len(), "Running judge evaluation");

        let output = match self.generator.generate(&request).await {
            Ok(output) => output,
            Err(e) if e.is_fatal() => return Err(EvaluationError::Fatal(e)),
            Err(e) => {
                warn!(error = %e, "Judge call failed, using fallback report");
                return Ok(JudgeVerdict {
                    report: JudgeReport::fallback_with_reason(UPSTREAM_ERROR_REASON),
                    rejection: Some(e.to_string()),
                    duration: start.elapsed(),
                });
            }
        };

        let (report, error) = JudgeReport::parse_or_fallback(&output.text);
        if let Some(ref e) = error {
            warn!(error = %e, "Judge output rejected, using fallback report");
        }
        let rejection = error.map(|e| e.to_string());

        info!(
            weighted_score = report.weighted_score,
            critical_failures = report.critical_failures.len(),
            duration_secs = output.duration.as_secs_f64(),
            "Judge completed"
        );

        Ok(JudgeVerdict {
            report,
            rejection,
            duration: start.elapsed(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Judge backend misconfigured: {0}")]
    Fatal(#[source] GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use storyloop_agent::GenerationOutput;

    /// Returns one canned reply (or error) and records the request
    struct Canned {
        reply: Mutex<Option<Result<String, GenerationError>>>,
        seen_temperature: Mutex<Option<f32>>,
    }

    impl Canned {
        fn new(reply: Result<String, GenerationError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                seen_temperature: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(
            &self,
            request: &GenerationRequest<'_>,
        ) -> Result<GenerationOutput, GenerationError> {
            *self.seen_temperature.lock().unwrap() = Some(request.temperature);
            let reply = self.reply.lock().unwrap().take().unwrap();
            reply.map(|text| GenerationOutput::new(text, request.model.into(), Duration::ZERO))
        }
    }

    #[tokio::test]
    async fn test_valid_output_is_parsed() {
        let json = serde_json::to_string(&JudgeReport::uniform(4.8)).unwrap();
        let backend = Canned::new(Ok(json));
        let verdict = JudgeEvaluator::new(&backend)
            .evaluate("A story", "judge-model")
            .await
            .unwrap();

        assert!(!verdict.used_fallback());
        assert_eq!(verdict.report.weighted_score, 4.8);
        assert_eq!(*backend.seen_temperature.lock().unwrap(), Some(0.0));
    }

    #[tokio::test]
    async fn test_bad_output_uses_fallback() {
        let backend = Canned::new(Ok("Great story, 10/10".into()));
        let verdict = JudgeEvaluator::new(&backend)
            .evaluate("A story", "judge-model")
            .await
            .unwrap();

        assert!(verdict.used_fallback());
        assert_eq!(verdict.report, JudgeReport::fallback());
    }

    #[tokio::test]
    async fn test_flagged_failure_kept_when_report_incomplete() {
        let output = r#"{"scores": {}, "critical_failures": ["unsafe behavior endorsed"],
            "weighted_score": 0.5, "fixes": []}"#;
        let backend = Canned::new(Ok(output.into()));
        let verdict = JudgeEvaluator::new(&backend)
            .evaluate("A story", "judge-model")
            .await
            .unwrap();

        assert!(verdict.used_fallback());
        assert!(verdict.report.has_critical_failures());
        assert_eq!(verdict.report.weighted_score, 0.0);
    }

    #[tokio::test]
    async fn test_timeout_uses_fallback() {
        let backend = Canned::new(Err(GenerationError::Timeout(Duration::from_secs(60))));
        let verdict = JudgeEvaluator::new(&backend)
            .evaluate("A story", "judge-model")
            .await
            .unwrap();

        assert!(verdict.used_fallback());
        assert_eq!(verdict.report.weighted_score, 0.0);
        assert_eq!(verdict.report.fail_reasons, vec![UPSTREAM_ERROR_REASON]);
        assert!(verdict.report.critical_failures.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_are_fatal() {
        let backend = Canned::new(Err(GenerationError::MissingCredentials("unset".into())));
        let result = JudgeEvaluator::new(&backend)
            .evaluate("A story", "judge-model")
            .await;

        assert!(matches!(result, Err(EvaluationError::Fatal(_))));
    }
}
