use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest and highest score any dimension (or the weighted average) may take
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 5.0;

/// One of the eight fixed rubric dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricDimension {
    AgeAppropriateness,
    InclusivitySafety,
    StructureArc,
    Engagement,
    ClarityGrammar,
    PromptAdherence,
    LessonTakeaway,
    InternalConsistency,
}

impl RubricDimension {
    pub const ALL: [RubricDimension; 8] = [
        RubricDimension::AgeAppropriateness,
        RubricDimension::InclusivitySafety,
        RubricDimension::StructureArc,
        RubricDimension::Engagement,
        RubricDimension::ClarityGrammar,
        RubricDimension::PromptAdherence,
        RubricDimension::LessonTakeaway,
        RubricDimension::InternalConsistency,
    ];

    /// JSON key used in judge output
    pub fn key(self) -> &'static str {
        match self {
            RubricDimension::AgeAppropriateness => "age_appropriateness",
            RubricDimension::InclusivitySafety => "inclusivity_safety",
            RubricDimension::StructureArc => "structure_arc",
            RubricDimension::Engagement => "engagement",
            RubricDimension::ClarityGrammar => "clarity_grammar",
            RubricDimension::PromptAdherence => "prompt_adherence",
            RubricDimension::LessonTakeaway => "lesson_takeaway",
            RubricDimension::InternalConsistency => "internal_consistency",
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            RubricDimension::AgeAppropriateness => 2.0,
            RubricDimension::InclusivitySafety => 1.4,
            RubricDimension::StructureArc => 1.2,
            RubricDimension::Engagement => 1.2,
            RubricDimension::ClarityGrammar => 1.0,
            RubricDimension::PromptAdherence => 1.2,
            RubricDimension::LessonTakeaway => 0.6,
            RubricDimension::InternalConsistency => 0.8,
        }
    }

    /// Dimensions whose low score forces a revision regardless of the average
    pub fn is_floor(self) -> bool {
        matches!(
            self,
            RubricDimension::AgeAppropriateness | RubricDimension::InclusivitySafety
        )
    }
}

impl std::fmt::Display for RubricDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for RubricDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RubricDimension::ALL
            .into_iter()
            .find(|d| d.key() == s)
            .ok_or_else(|| format!("Unknown rubric dimension: {}", s))
    }
}

/// The fixed weighting scheme
pub struct Rubric;

impl Rubric {
    pub fn total_weight() -> f64 {
        RubricDimension::ALL.iter().map(|d| d.weight()).sum()
    }

    /// Weighted average of the given scores, rounded to one decimal place.
    /// Missing dimensions count as zero.
    pub fn weighted_score(scores: &BTreeMap<RubricDimension, f64>) -> f64 {
        let weighted: f64 = RubricDimension::ALL
            .iter()
            .map(|d| d.weight() * scores.get(d).copied().unwrap_or(0.0))
            .sum();
        round_tenth(weighted / Self::total_weight())
    }
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(value: f64) -> BTreeMap<RubricDimension, f64> {
        RubricDimension::ALL.iter().map(|d| (*d, value)).collect()
    }

    #[test]
    fn test_total_weight() {
        assert!((Rubric::total_weight() - 9.4).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_scores_average_to_themselves() {
        assert_eq!(Rubric::weighted_score(&uniform(5.0)), 5.0);
        assert_eq!(Rubric::weighted_score(&uniform(4.6)), 4.6);
        assert_eq!(Rubric::weighted_score(&uniform(0.0)), 0.0);
    }

    #[test]
    fn test_weights_are_applied() {
        // Age at 0, everything else at 5: (9.4 - 2.0) * 5 / 9.4 = 3.936...
        let mut scores = uniform(5.0);
        scores.insert(RubricDimension::AgeAppropriateness, 0.0);
        assert_eq!(Rubric::weighted_score(&scores), 3.9);

        // Lesson at 0 costs far less: (9.4 - 0.6) * 5 / 9.4 = 4.68...
        let mut scores = uniform(5.0);
        scores.insert(RubricDimension::LessonTakeaway, 0.0);
        assert_eq!(Rubric::weighted_score(&scores), 4.7);
    }

    #[test]
    fn test_missing_dimensions_count_as_zero() {
        assert_eq!(Rubric::weighted_score(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_dimension_keys_round_trip() {
        for dim in RubricDimension::ALL {
            assert_eq!(dim.key().parse::<RubricDimension>().unwrap(), dim);
            let json = serde_json::to_string(&dim).unwrap();
            assert_eq!(json, format!("\"{}\"", dim.key()));
        }
        assert!("vibes".parse::<RubricDimension>().is_err());
    }

    #[test]
    fn test_floor_dimensions() {
        let floors: Vec<_> = RubricDimension::ALL
            .into_iter()
            .filter(|d| d.is_floor())
            .collect();
        assert_eq!(
            floors,
            vec![
                RubricDimension::AgeAppropriateness,
                RubricDimension::InclusivitySafety
            ]
        );
    }
}
