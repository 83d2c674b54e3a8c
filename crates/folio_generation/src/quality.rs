//! Multi-dimension quality scoring.

use crate::extraction::parse_response;
use crate::prompts::{self, EVALUATION_EXCERPT_CHARS};
use folio_core::{
    AutoFixResult, BookBlueprint, ChapterBlueprint, ComprehensiveQualityReport,
    DEFAULT_DIMENSION_SCORE, DimensionScore, GenerationConfig, GenerationOptions, Issue,
    IssueSeverity, MAX_REVISION_INSTRUCTIONS, QualityDimension, RevisionInstruction, Verdict,
    Weakness,
};
use folio_error::{FolioResult, PipelineError, PipelineErrorKind};
use folio_interface::GenerationBackend;
use serde::Deserialize;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument, warn};

/// Token limit for one dimension's JSON response.
const DIMENSION_RESPONSE_TOKENS: u32 = 1_000;

/// Heuristic score gain credited per applied fix.
const POINTS_PER_FIX: f64 = 2.0;

#[derive(Debug, Deserialize)]
struct DimensionResponse {
    score: f64,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<WeaknessEntry>,
    #[serde(default)]
    explanation: String,
}

/// Weaknesses arrive either as bare strings or as detailed objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WeaknessEntry {
    Text(String),
    Detailed {
        #[serde(alias = "description")]
        issue: String,
        #[serde(default)]
        excerpt: Option<String>,
        #[serde(default)]
        suggestion: Option<String>,
    },
}

impl From<WeaknessEntry> for Weakness {
    fn from(entry: WeaknessEntry) -> Self {
        match entry {
            WeaknessEntry::Text(description) => Weakness::new(description),
            WeaknessEntry::Detailed {
                issue,
                excerpt,
                suggestion,
            } => Weakness {
                description: issue,
                excerpt: excerpt.filter(|e| !e.trim().is_empty()),
                suggestion: suggestion.filter(|s| !s.trim().is_empty()),
            },
        }
    }
}

/// Parse one dimension's response, or `None` if it is unusable.
pub(crate) fn parse_dimension(dimension: QualityDimension, response: &str) -> Option<DimensionScore> {
    let parsed: DimensionResponse = match parse_response(response) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(%dimension, error = %e, "Unparseable dimension response");
            return None;
        }
    };
    if !parsed.score.is_finite() {
        warn!(%dimension, "Dimension score is not a number");
        return None;
    }
    Some(DimensionScore {
        dimension,
        score: parsed.score.clamp(0.0, 100.0),
        weight: dimension.weight(),
        strengths: parsed.strengths,
        weaknesses: parsed.weaknesses.into_iter().map(Weakness::from).collect(),
        explanation: parsed.explanation,
    })
}

/// Turn every weakness into an issue whose severity follows its dimension's score.
pub fn extract_issues(dimensions: &[DimensionScore]) -> Vec<Issue> {
    let mut issues = Vec::new();
    for dimension in dimensions {
        let severity = IssueSeverity::from_dimension_score(dimension.score);
        let tag = dimension.dimension.to_string().to_lowercase();
        for (index, weakness) in dimension.weaknesses.iter().enumerate() {
            issues.push(Issue {
                id: format!("{}-{}", tag, index + 1),
                dimension: dimension.dimension,
                severity,
                description: weakness.description.clone(),
                excerpt: weakness.excerpt.clone(),
                suggestion: weakness.suggestion.clone(),
                auto_fixable: severity == IssueSeverity::Minor,
                score_impact: (100.0 - dimension.score) / 10.0,
            });
        }
    }
    issues
}

/// Prioritised instructions: critical issues first, up to half the budget,
/// then major issues until the budget is spent.
pub fn revision_instructions(issues: &[Issue]) -> Vec<RevisionInstruction> {
    let critical_budget = MAX_REVISION_INSTRUCTIONS / 2;
    let critical = issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Critical)
        .take(critical_budget);
    let selected: Vec<&Issue> = critical.collect();
    let remaining = MAX_REVISION_INSTRUCTIONS - selected.len();
    let major = issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Major)
        .take(remaining);

    selected
        .into_iter()
        .chain(major)
        .enumerate()
        .map(|(rank, issue)| RevisionInstruction {
            priority: rank + 1,
            issue_id: issue.id.clone(),
            target_location: match &issue.excerpt {
                Some(excerpt) => format!(
                    "Passage beginning \"{}\"",
                    prompts::leading_chars(excerpt, 60)
                ),
                None => format!("{} throughout the chapter", issue.dimension),
            },
            current_excerpt: issue.excerpt.clone(),
            instruction: match &issue.suggestion {
                Some(suggestion) => format!("{} {}", issue.description, suggestion),
                None => format!("Address: {}", issue.description),
            },
        })
        .collect()
}

/// Assemble a report from dimension scores.
///
/// # Examples
///
/// ```
/// use folio_core::{DimensionScore, QualityDimension, Verdict};
/// use folio_generation::build_report;
///
/// let dimensions = vec![DimensionScore {
///     score: 45.0,
///     ..DimensionScore::fallback(QualityDimension::Plot)
/// }];
/// let report = build_report(dimensions);
/// assert_eq!(report.verdict, Verdict::NeedsWork);
/// assert!(report.auto_revision_recommended);
/// ```
pub fn build_report(dimensions: Vec<DimensionScore>) -> ComprehensiveQualityReport {
    let overall_score = ComprehensiveQualityReport::weighted_score(&dimensions);
    let verdict = Verdict::from_score(overall_score);
    let issues = extract_issues(&dimensions);
    let auto_revision_recommended = verdict.recommends_revision();
    let revision_instructions = if auto_revision_recommended {
        revision_instructions(&issues)
    } else {
        Vec::new()
    };
    ComprehensiveQualityReport {
        dimensions,
        overall_score,
        verdict,
        issues,
        revision_instructions,
        auto_revision_recommended,
    }
}

/// Scores chapters along six weighted dimensions.
pub struct QualityEvaluator<B: GenerationBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: GenerationBackend + ?Sized> Clone for QualityEvaluator<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: GenerationBackend + ?Sized> QualityEvaluator<B> {
    /// Create an evaluator over `backend`.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Evaluate `content`, one backend call per dimension, in order.
    ///
    /// A failed or malformed dimension is scored [`DEFAULT_DIMENSION_SCORE`]
    /// and evaluation carries on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineErrorKind::EmptyContent`] for blank content.
    #[instrument(skip_all, fields(chapter = chapter.number, chars = content.len()))]
    pub async fn evaluate(
        &self,
        content: &str,
        chapter: &ChapterBlueprint,
        blueprint: &BookBlueprint,
        config: &GenerationConfig,
    ) -> FolioResult<ComprehensiveQualityReport> {
        if content.trim().is_empty() {
            return Err(PipelineError::new(PipelineErrorKind::EmptyContent).into());
        }
        let excerpt = prompts::leading_chars(content, EVALUATION_EXCERPT_CHARS);
        let options =
            GenerationOptions::json(*config.evaluation_temperature(), DIMENSION_RESPONSE_TOKENS);

        let mut dimensions = Vec::new();
        for dimension in QualityDimension::iter() {
            let prompt = prompts::quality_prompt(dimension, excerpt, chapter, blueprint);
            let score = match self.backend.generate(&prompt, &options).await {
                Ok(response) => parse_dimension(dimension, &response),
                Err(e) => {
                    warn!(%dimension, error = %e, "Dimension evaluation failed");
                    None
                }
            };
            let score = score.unwrap_or_else(|| DimensionScore::fallback(dimension));
            debug!(%dimension, score = score.score, "Dimension scored");
            dimensions.push(score);
        }

        let report = build_report(dimensions);
        info!(
            overall = report.overall_score,
            verdict = %report.verdict,
            issues = report.issues.len(),
            "Quality evaluation complete"
        );
        Ok(report)
    }

    /// Rewrite minor, auto-fixable issues one at a time and splice each fix
    /// into the text as a literal replacement of its excerpt.
    ///
    /// Issues without an excerpt, or whose excerpt is no longer in the text,
    /// stay unfixed, as do issues whose rewrite call fails.
    #[instrument(skip_all, fields(issues = issues.len()))]
    pub async fn auto_fix_issues(
        &self,
        content: &str,
        issues: &[Issue],
        config: &GenerationConfig,
    ) -> AutoFixResult {
        let mut text = content.to_string();
        let mut applied = Vec::new();
        let mut unfixed = Vec::new();

        let eligible = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Minor && i.auto_fixable);
        for issue in eligible {
            let Some(excerpt) = issue.excerpt.as_deref().filter(|e| text.contains(*e)) else {
                unfixed.push(issue.clone());
                continue;
            };
            let prompt = prompts::fix_prompt(issue, excerpt);
            let max_tokens = u32::try_from(self.backend.estimate_tokens(excerpt) * 2 + 64)
                .unwrap_or(u32::MAX);
            let options = GenerationOptions::text(*config.temperature(), max_tokens);
            match self.backend.generate(&prompt, &options).await {
                Ok(rewrite) if !rewrite.trim().is_empty() => {
                    text = text.replacen(excerpt, rewrite.trim(), 1);
                    applied.push(issue.clone());
                }
                Ok(_) => {
                    warn!(issue = %issue.id, "Empty rewrite");
                    unfixed.push(issue.clone());
                }
                Err(e) => {
                    warn!(issue = %issue.id, error = %e, "Rewrite failed");
                    unfixed.push(issue.clone());
                }
            }
        }

        let estimated_improvement = applied.len() as f64 * POINTS_PER_FIX;
        AutoFixResult {
            content: text,
            applied,
            unfixed,
            estimated_improvement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimension(dimension: QualityDimension, score: f64, weaknesses: &[&str]) -> DimensionScore {
        DimensionScore {
            score,
            weaknesses: weaknesses.iter().map(|w| Weakness::new(*w)).collect(),
            ..DimensionScore::fallback(dimension)
        }
    }

    fn issue(id: &str, severity: IssueSeverity) -> Issue {
        Issue {
            id: id.to_string(),
            dimension: QualityDimension::Plot,
            severity,
            description: id.to_string(),
            excerpt: None,
            suggestion: None,
            auto_fixable: false,
            score_impact: 1.0,
        }
    }

    #[test]
    fn parses_string_and_object_weaknesses() {
        let response = r#"```json
{"score": 64, "strengths": ["tight"], "weaknesses": ["flat ending",
 {"issue": "clumsy line", "excerpt": "It was dark.", "suggestion": "Be specific."}],
 "explanation": "ok"}
```"#;
        let score = parse_dimension(QualityDimension::Style, response).unwrap();
        assert_eq!(score.score, 64.0);
        assert_eq!(score.weight, 1.0);
        assert_eq!(score.weaknesses[0], Weakness::new("flat ending"));
        assert_eq!(score.weaknesses[1].excerpt.as_deref(), Some("It was dark."));
    }

    #[test]
    fn missing_score_is_unusable() {
        assert!(parse_dimension(QualityDimension::Plot, r#"{"strengths": []}"#).is_none());
        assert!(parse_dimension(QualityDimension::Plot, "no json").is_none());
    }

    #[test]
    fn scores_are_clamped() {
        let score = parse_dimension(QualityDimension::Pacing, r#"{"score": 140}"#).unwrap();
        assert_eq!(score.score, 100.0);
    }

    #[test]
    fn issue_severity_and_impact_follow_dimension_score() {
        let issues = extract_issues(&[
            dimension(QualityDimension::Plot, 40.0, &["holes"]),
            dimension(QualityDimension::Dialogue, 65.0, &["stiff", "samey"]),
            dimension(QualityDimension::Style, 80.0, &["adverbs"]),
        ]);
        assert_eq!(issues.len(), 4);
        assert_eq!(issues[0].severity, IssueSeverity::Major);
        assert!(!issues[0].auto_fixable);
        assert_eq!(issues[0].score_impact, 6.0);
        assert_eq!(issues[1].id, "dialogue-1");
        assert_eq!(issues[2].id, "dialogue-2");
        assert!(issues[1].auto_fixable);
        assert_eq!(issues[3].severity, IssueSeverity::Suggestion);
    }

    #[test]
    fn instructions_cap_critical_at_half_then_fill_with_major() {
        let mut issues: Vec<Issue> = (0..8)
            .map(|i| issue(&format!("crit-{}", i), IssueSeverity::Critical))
            .collect();
        issues.extend((0..8).map(|i| issue(&format!("major-{}", i), IssueSeverity::Major)));
        issues.push(issue("minor", IssueSeverity::Minor));

        let instructions = revision_instructions(&issues);
        assert_eq!(instructions.len(), MAX_REVISION_INSTRUCTIONS);
        assert_eq!(
            instructions
                .iter()
                .filter(|i| i.issue_id.starts_with("crit"))
                .count(),
            5
        );
        assert_eq!(instructions[0].priority, 1);
        assert_eq!(instructions[5].issue_id, "major-0");
        assert!(instructions.iter().all(|i| i.issue_id != "minor"));
    }

    #[test]
    fn report_without_revision_need_has_no_instructions() {
        let report = build_report(vec![dimension(QualityDimension::Plot, 65.0, &["meh"])]);
        assert_eq!(report.verdict, Verdict::Acceptable);
        assert!(!report.auto_revision_recommended);
        assert!(report.revision_instructions.is_empty());
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn empty_dimensions_default_to_seventy() {
        let report = build_report(Vec::new());
        assert_eq!(report.overall_score, DEFAULT_DIMENSION_SCORE);
    }
}
