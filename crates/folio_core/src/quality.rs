//! Quality scoring types.

use serde::{Deserialize, Serialize};

/// Upper bound on revision instructions attached to one report.
pub const MAX_REVISION_INSTRUCTIONS: usize = 10;

/// The six axes a chapter is scored on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumIter,
)]
pub enum QualityDimension {
    /// Narrative flow and coherence
    Narrative,
    /// Characterization and consistency of voice
    Character,
    /// Plot advancement and logic
    Plot,
    /// Prose quality and adherence to the style guide
    Style,
    /// Pacing against the chapter plan
    Pacing,
    /// Dialogue naturalness and purpose
    Dialogue,
}

impl QualityDimension {
    /// Weight of this dimension in the overall score.
    pub fn weight(&self) -> f64 {
        match self {
            QualityDimension::Narrative => 1.0,
            QualityDimension::Character => 1.2,
            QualityDimension::Plot => 1.3,
            QualityDimension::Style => 1.0,
            QualityDimension::Pacing => 0.9,
            QualityDimension::Dialogue => 0.8,
        }
    }
}

/// Score for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// Which dimension
    pub dimension: QualityDimension,
    /// Score in [0, 100]
    pub score: f64,
    /// Weight applied in the overall score
    pub weight: f64,
    /// What works
    pub strengths: Vec<String>,
    /// What does not
    pub weaknesses: Vec<Weakness>,
    /// Free-form rationale
    pub explanation: String,
}

impl DimensionScore {
    /// Placeholder used when a dimension's response is missing or malformed.
    pub fn fallback(dimension: QualityDimension) -> Self {
        Self {
            dimension,
            score: DEFAULT_DIMENSION_SCORE,
            weight: dimension.weight(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            explanation: "Default score assigned".to_string(),
        }
    }

    /// Display name of the dimension.
    pub fn name(&self) -> String {
        self.dimension.to_string()
    }
}

/// Score assigned to a dimension, or to the whole report, with no usable data.
pub const DEFAULT_DIMENSION_SCORE: f64 = 70.0;

/// One weakness reported for a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weakness {
    /// What is wrong
    pub description: String,
    /// Verbatim passage exhibiting the problem, when supplied
    pub excerpt: Option<String>,
    /// Suggested remedy, when supplied
    pub suggestion: Option<String>,
}

impl Weakness {
    /// A weakness with only a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            excerpt: None,
            suggestion: None,
        }
    }
}

/// Overall judgement derived from the overall score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum Verdict {
    /// Below 40
    Regenerate,
    /// 40 up to 60
    NeedsWork,
    /// 60 up to 75
    Acceptable,
    /// 75 up to 90
    Good,
    /// 90 and above
    Excellent,
}

impl Verdict {
    /// Step function over the overall score; each bound is inclusive.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_core::Verdict;
    ///
    /// assert_eq!(Verdict::from_score(90.0), Verdict::Excellent);
    /// assert_eq!(Verdict::from_score(89.9), Verdict::Good);
    /// assert_eq!(Verdict::from_score(59.9), Verdict::NeedsWork);
    /// ```
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Verdict::Excellent
        } else if score >= 75.0 {
            Verdict::Good
        } else if score >= 60.0 {
            Verdict::Acceptable
        } else if score >= 40.0 {
            Verdict::NeedsWork
        } else {
            Verdict::Regenerate
        }
    }

    /// Whether this verdict calls for automatic revision.
    pub fn recommends_revision(&self) -> bool {
        matches!(self, Verdict::NeedsWork | Verdict::Regenerate)
    }
}

/// Severity of a quality issue; ordered most severe first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum IssueSeverity {
    /// Must be fixed before the chapter is usable
    Critical,
    /// Significant problem
    Major,
    /// Small problem, fixable in isolation
    Minor,
    /// Optional improvement
    Suggestion,
}

impl IssueSeverity {
    /// Severity implied by the score of the dimension that raised the issue.
    pub fn from_dimension_score(score: f64) -> Self {
        if score < 50.0 {
            IssueSeverity::Major
        } else if score < 70.0 {
            IssueSeverity::Minor
        } else {
            IssueSeverity::Suggestion
        }
    }
}

/// A quality problem found in a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable id within the report, e.g. `plot-2`
    pub id: String,
    /// Dimension that raised it
    pub dimension: QualityDimension,
    /// Severity
    pub severity: IssueSeverity,
    /// Description of the problem
    pub description: String,
    /// Offending passage, when known
    pub excerpt: Option<String>,
    /// Suggested remedy, when known
    pub suggestion: Option<String>,
    /// Whether the issue can be rewritten in isolation
    pub auto_fixable: bool,
    /// Estimated score impact, `(100 - dimension score) / 10`
    pub score_impact: f64,
}

/// A prioritised instruction for the revision pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionInstruction {
    /// 1 is most important
    pub priority: usize,
    /// Issue this instruction addresses
    pub issue_id: String,
    /// Where in the chapter to apply it
    pub target_location: String,
    /// Current text at that location, if known
    pub current_excerpt: Option<String>,
    /// What to change
    pub instruction: String,
}

/// Full quality report for one chapter draft.
///
/// `overall_score` is always [`ComprehensiveQualityReport::weighted_score`] of
/// `dimensions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveQualityReport {
    /// Per-dimension scores, in evaluation order
    pub dimensions: Vec<DimensionScore>,
    /// Weighted overall score in [0, 100]
    pub overall_score: f64,
    /// Verdict derived from the overall score
    pub verdict: Verdict,
    /// Issues extracted from dimension weaknesses
    pub issues: Vec<Issue>,
    /// Instructions for the revision pass, most important first
    pub revision_instructions: Vec<RevisionInstruction>,
    /// Whether the verdict calls for automatic revision
    pub auto_revision_recommended: bool,
}

impl ComprehensiveQualityReport {
    /// Weighted mean of the dimension scores, clamped to [0, 100].
    ///
    /// Falls back to [`DEFAULT_DIMENSION_SCORE`] when there is nothing to weigh.
    pub fn weighted_score(dimensions: &[DimensionScore]) -> f64 {
        let total_weight: f64 = dimensions.iter().map(|d| d.weight).sum();
        if dimensions.is_empty() || total_weight <= 0.0 {
            return DEFAULT_DIMENSION_SCORE;
        }
        let weighted: f64 = dimensions.iter().map(|d| d.score * d.weight).sum();
        (weighted / total_weight).clamp(0.0, 100.0)
    }

    /// Score for a single dimension, if it was evaluated.
    pub fn dimension(&self, dimension: QualityDimension) -> Option<&DimensionScore> {
        self.dimensions.iter().find(|d| d.dimension == dimension)
    }

    /// Issues ordered most severe first, stable within a severity.
    pub fn issues_by_severity(&self) -> Vec<&Issue> {
        let mut issues: Vec<&Issue> = self.issues.iter().collect();
        issues.sort_by_key(|i| i.severity);
        issues
    }
}

/// Outcome of an automatic fix pass over minor issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoFixResult {
    /// Chapter text after the applied fixes
    pub content: String,
    /// Issues whose fix was applied
    pub applied: Vec<Issue>,
    /// Eligible issues that could not be fixed
    pub unfixed: Vec<Issue>,
    /// Heuristic score gain, +2 per applied fix
    pub estimated_improvement: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(dimension: QualityDimension, value: f64) -> DimensionScore {
        DimensionScore {
            score: value,
            ..DimensionScore::fallback(dimension)
        }
    }

    #[test]
    fn verdict_thresholds_are_inclusive_lower_bounds() {
        assert_eq!(Verdict::from_score(100.0), Verdict::Excellent);
        assert_eq!(Verdict::from_score(75.0), Verdict::Good);
        assert_eq!(Verdict::from_score(74.99), Verdict::Acceptable);
        assert_eq!(Verdict::from_score(60.0), Verdict::Acceptable);
        assert_eq!(Verdict::from_score(40.0), Verdict::NeedsWork);
        assert_eq!(Verdict::from_score(39.9), Verdict::Regenerate);
        assert_eq!(Verdict::from_score(0.0), Verdict::Regenerate);
    }

    #[test]
    fn verdict_is_monotone() {
        let mut previous = Verdict::from_score(0.0);
        for step in 0..=1000 {
            let current = Verdict::from_score(step as f64 / 10.0);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn weighted_score_uses_weights() {
        let dims = vec![
            score(QualityDimension::Plot, 100.0),
            score(QualityDimension::Dialogue, 0.0),
        ];
        let expected = (100.0 * 1.3) / (1.3 + 0.8);
        assert!((ComprehensiveQualityReport::weighted_score(&dims) - expected).abs() < 1e-9);
    }

    #[test]
    fn weighted_score_defaults_without_dimensions() {
        assert_eq!(ComprehensiveQualityReport::weighted_score(&[]), 70.0);
    }

    #[test]
    fn severity_follows_dimension_score() {
        assert_eq!(IssueSeverity::from_dimension_score(49.9), IssueSeverity::Major);
        assert_eq!(IssueSeverity::from_dimension_score(50.0), IssueSeverity::Minor);
        assert_eq!(IssueSeverity::from_dimension_score(69.9), IssueSeverity::Minor);
        assert_eq!(IssueSeverity::from_dimension_score(70.0), IssueSeverity::Suggestion);
    }
}
