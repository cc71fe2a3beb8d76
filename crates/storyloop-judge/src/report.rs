use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::repair::extract_json_object;
use crate::rubric::{round_tenth, Rubric, RubricDimension, MAX_SCORE, MIN_SCORE};

/// Marker placed in `fail_reasons` when the judge output could not be parsed
pub const BAD_JSON_REASON: &str = "bad_json";

/// Structured verdict from one judge invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeReport {
    /// Per-dimension scores in [0, 5]. Empty for the fallback report.
    #[serde(default)]
    pub scores: BTreeMap<RubricDimension, f64>,
    /// Hard safety violations; non-empty stops the loop
    #[serde(default)]
    pub critical_failures: Vec<String>,
    /// Weighted average of `scores`, rounded to 0.1
    pub weighted_score: f64,
    /// Concrete edits for the reviser, in order
    #[serde(default)]
    pub fixes: Vec<String>,
    /// Elements the reviser should keep
    #[serde(default)]
    pub praise: Vec<String>,
    /// Terse per-dimension scoreboards
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rationales: BTreeMap<String, String>,
    /// Older alias of `critical_failures`; also carries the fallback marker
    #[serde(default)]
    pub fail_reasons: Vec<String>,
}

/// Why judge output could not be turned into a [`JudgeReport`]
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No JSON object found in judge output")]
    NoJsonObject,

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Field {field} is out of range [0, 5]: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

impl JudgeReport {
    /// The deterministic report used whenever judge output is unusable.
    ///
    /// Every dimension reads as zero and `critical_failures` stays empty, so the
    /// loop revises (or stops at the round cap) instead of treating a formatting
    /// problem as a safety violation.
    pub fn fallback() -> Self {
        Self::fallback_with_reason(BAD_JSON_REASON)
    }

    /// Fallback report tagged with a different reason (e.g. an upstream failure)
    pub fn fallback_with_reason(reason: &str) -> Self {
        Self {
            scores: BTreeMap::new(),
            critical_failures: Vec::new(),
            weighted_score: 0.0,
            fixes: Vec::new(),
            praise: Vec::new(),
            rationales: BTreeMap::new(),
            fail_reasons: vec![reason.to_string()],
        }
    }

    /// Build a consistent report from scores, computing the weighted score
    pub fn from_scores(scores: BTreeMap<RubricDimension, f64>) -> Self {
        let weighted_score = Rubric::weighted_score(&scores);
        Self {
            scores,
            critical_failures: Vec::new(),
            weighted_score,
            fixes: Vec::new(),
            praise: Vec::new(),
            rationales: BTreeMap::new(),
            fail_reasons: Vec::new(),
        }
    }

    /// Same score on every dimension
    pub fn uniform(score: f64) -> Self {
        Self::from_scores(RubricDimension::ALL.iter().map(|d| (*d, score)).collect())
    }

    pub fn with_score(mut self, dimension: RubricDimension, score: f64) -> Self {
        self.scores.insert(dimension, score);
        self.weighted_score = Rubric::weighted_score(&self.scores);
        self
    }

    pub fn with_critical_failures(mut self, failures: Vec<String>) -> Self {
        self.fail_reasons = failures.clone();
        self.critical_failures = failures;
        self
    }

    pub fn with_fixes(mut self, fixes: Vec<String>) -> Self {
        self.fixes = fixes;
        self
    }

    pub fn with_praise(mut self, praise: Vec<String>) -> Self {
        self.praise = praise;
        self
    }

    /// Score for a dimension; absent dimensions read as zero
    pub fn score(&self, dimension: RubricDimension) -> f64 {
        self.scores.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn has_critical_failures(&self) -> bool {
        !self.critical_failures.is_empty()
    }

    pub fn is_fallback(&self) -> bool {
        self.scores.is_empty() && !self.fail_reasons.is_empty()
    }

    /// What the weighted score should be under the fixed weights
    pub fn expected_weighted_score(&self) -> f64 {
        Rubric::weighted_score(&self.scores)
    }

    /// Short description for logging
    pub fn short_description(&self) -> String {
        if self.is_fallback() {
            format!("FALLBACK ({})", self.fail_reasons.join(", "))
        } else if self.has_critical_failures() {
            format!(
                "{:.1} ({} critical failures)",
                self.weighted_score,
                self.critical_failures.len()
            )
        } else {
            format!("{:.1} ({} fixes)", self.weighted_score, self.fixes.len())
        }
    }

    /// Parse raw judge output.
    ///
    /// Total and side-effect free: any output either yields a fully validated
    /// report or a named [`ReportError`].
    pub fn parse(output: &str) -> Result<Self, ReportError> {
        debug!(output_len = output.len(), "Parsing judge report");
        Self::from_value(&decode(output)?)
    }

    /// Parse, substituting the fallback report on any failure.
    ///
    /// When the output decodes to an object that flags critical failures but
    /// breaks some other rule, the flagged failures are carried into the
    /// fallback so the safety stop still fires.
    pub fn parse_or_fallback(output: &str) -> (Self, Option<ReportError>) {
        let value = match decode(output) {
            Ok(value) => value,
            Err(e) => return (Self::fallback(), Some(e)),
        };

        match Self::from_value(&value) {
            Ok(report) => (report, None),
            Err(e) => {
                let flagged = flagged_failures(&value);
                if !flagged.is_empty() {
                    warn!(
                        error = %e,
                        critical_failures = flagged.len(),
                        "Judge report invalid but flags critical failures; keeping them"
                    );
                }
                (Self::fallback().with_flagged_failures(flagged), Some(e))
            }
        }
    }

    /// Keep judge-flagged failures on a fallback report alongside its marker
    fn with_flagged_failures(mut self, flagged: Vec<String>) -> Self {
        self.fail_reasons.extend(flagged.iter().cloned());
        self.critical_failures = flagged;
        self
    }

    /// Validate an already-decoded JSON value
    pub fn from_value(value: &Value) -> Result<Self, ReportError> {
        let obj = value.as_object().ok_or(ReportError::WrongType {
            field: "report",
            expected: "an object",
        })?;

        let fail_reasons = obj
            .get("fail_reasons")
            .map(|v| string_list("fail_reasons", v))
            .transpose()?;
        let critical_failures = match obj.get("critical_failures") {
            Some(v) => string_list("critical_failures", v)?,
            None => fail_reasons
                .clone()
                .ok_or(ReportError::MissingField("critical_failures"))?,
        };
        let fail_reasons = fail_reasons.unwrap_or_else(|| critical_failures.clone());

        let raw_scores = required(obj, "scores")?
            .as_object()
            .ok_or(ReportError::WrongType {
                field: "scores",
                expected: "an object",
            })?;

        let mut scores = BTreeMap::new();
        for dimension in RubricDimension::ALL {
            let raw = raw_scores
                .get(dimension.key())
                .ok_or(ReportError::MissingField(dimension.key()))?;
            scores.insert(dimension, score_value(dimension.key(), raw)?);
        }

        let weighted_score = score_value("weighted_score", required(obj, "weighted_score")?)?;

        let fixes = string_list("fixes", required(obj, "fixes")?)?;
        let praise = string_list("praise", required(obj, "praise")?)?;

        let rationales = match obj.get("rationales") {
            Some(v) => rationale_map(v)?,
            None => BTreeMap::new(),
        };

        let expected = Rubric::weighted_score(&scores);
        if (expected - round_tenth(weighted_score)).abs() > 0.1 + f64::EPSILON {
            debug!(
                reported = weighted_score,
                expected, "Judge weighted score disagrees with rubric weights"
            );
        }

        Ok(Self {
            scores,
            critical_failures,
            weighted_score,
            fixes,
            praise,
            rationales,
            fail_reasons,
        })
    }
}

fn decode(output: &str) -> Result<Value, ReportError> {
    let json = extract_json_object(output).ok_or(ReportError::NoJsonObject)?;
    Ok(serde_json::from_str(json)?)
}

/// Whatever failure strings the judge flagged, read leniently
fn flagged_failures(value: &Value) -> Vec<String> {
    value
        .get("critical_failures")
        .or_else(|| value.get("fail_reasons"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ReportError> {
    obj.get(field).ok_or(ReportError::MissingField(field))
}

fn score_value(field: &'static str, value: &Value) -> Result<f64, ReportError> {
    let n = value.as_f64().ok_or(ReportError::WrongType {
        field,
        expected: "a number",
    })?;
    if !(MIN_SCORE..=MAX_SCORE).contains(&n) {
        return Err(ReportError::OutOfRange { field, value: n });
    }
    Ok(n)
}

fn string_list(field: &'static str, value: &Value) -> Result<Vec<String>, ReportError> {
    let wrong = || ReportError::WrongType {
        field,
        expected: "an array of strings",
    };
    value
        .as_array()
        .ok_or_else(wrong)?
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(wrong))
        .collect()
}

fn rationale_map(value: &Value) -> Result<BTreeMap<String, String>, ReportError> {
    let wrong = || ReportError::WrongType {
        field: "rationales",
        expected: "an object of strings",
    };
    value
        .as_object()
        .ok_or_else(wrong)?
        .iter()
        .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())).ok_or_else(wrong))
        .collect()
}
