//! Continuity report types.

use serde::{Deserialize, Serialize};

/// Minimum score for a chapter to pass the continuity check.
pub const CONTINUITY_PASS_SCORE: f64 = 70.0;

/// Category of continuity problem.
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
pub enum ContinuityCategory {
    /// Personality, knowledge, relationships, physical state
    Character,
    /// Contradictions with earlier events or dropped threads
    Plot,
    /// Ordering of events and elapsed time
    Timeline,
    /// Locations and world rules
    Setting,
    /// Tracked objects
    Object,
}

/// Severity of a continuity problem; ordered most severe first.
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
pub enum ContinuitySeverity {
    /// Breaks the story
    Critical,
    /// Noticeable to a careful reader
    Major,
    /// Cosmetic
    Minor,
}

impl ContinuitySeverity {
    /// Parse a severity label case-insensitively; anything unknown is Minor.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => ContinuitySeverity::Critical,
            "major" => ContinuitySeverity::Major,
            _ => ContinuitySeverity::Minor,
        }
    }
}

/// A single continuity problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuityIssue {
    /// Category that raised it
    pub category: ContinuityCategory,
    /// Severity
    pub severity: ContinuitySeverity,
    /// What is inconsistent
    pub description: String,
    /// Offending passage, when supplied
    pub excerpt: Option<String>,
    /// Suggested remedy, when supplied
    pub suggestion: Option<String>,
}

/// Continuity score for the given issue counts.
///
/// `clamp(100 - 20 * critical - 5 * (total - critical), 0, 100)`
///
/// # Examples
///
/// ```
/// use folio_core::continuity_score;
///
/// assert_eq!(continuity_score(0, 0), 100.0);
/// assert_eq!(continuity_score(1, 3), 70.0);
/// assert_eq!(continuity_score(5, 5), 0.0);
/// ```
pub fn continuity_score(critical: usize, total: usize) -> f64 {
    let other = total.saturating_sub(critical);
    (100.0 - 20.0 * critical as f64 - 5.0 * other as f64).clamp(0.0, 100.0)
}

/// Continuity findings for one chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ContinuityReport {
    /// Character issues
    character_issues: Vec<ContinuityIssue>,
    /// Plot issues
    plot_issues: Vec<ContinuityIssue>,
    /// Timeline issues
    timeline_issues: Vec<ContinuityIssue>,
    /// Setting issues
    setting_issues: Vec<ContinuityIssue>,
    /// Object issues
    object_issues: Vec<ContinuityIssue>,
    /// Score in [0, 100]
    score: f64,
    /// Score at least 70 and no critical issue
    passes: bool,
}

impl ContinuityReport {
    /// Build a report from per-category issue lists, computing score and pass.
    pub fn from_issues(
        character_issues: Vec<ContinuityIssue>,
        plot_issues: Vec<ContinuityIssue>,
        timeline_issues: Vec<ContinuityIssue>,
        setting_issues: Vec<ContinuityIssue>,
        object_issues: Vec<ContinuityIssue>,
    ) -> Self {
        let mut report = Self {
            character_issues,
            plot_issues,
            timeline_issues,
            setting_issues,
            object_issues,
            score: 100.0,
            passes: true,
        };
        let critical = report.critical_count();
        let total = report.total_count();
        report.score = continuity_score(critical, total);
        report.passes = report.score >= CONTINUITY_PASS_SCORE && critical == 0;
        report
    }

    /// A report with no issues.
    pub fn clean() -> Self {
        Self::from_issues(Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }

    /// Issues of one category.
    pub fn issues_for(&self, category: ContinuityCategory) -> &[ContinuityIssue] {
        match category {
            ContinuityCategory::Character => &self.character_issues,
            ContinuityCategory::Plot => &self.plot_issues,
            ContinuityCategory::Timeline => &self.timeline_issues,
            ContinuityCategory::Setting => &self.setting_issues,
            ContinuityCategory::Object => &self.object_issues,
        }
    }

    /// All issues, category by category.
    pub fn all_issues(&self) -> impl Iterator<Item = &ContinuityIssue> {
        self.character_issues
            .iter()
            .chain(&self.plot_issues)
            .chain(&self.timeline_issues)
            .chain(&self.setting_issues)
            .chain(&self.object_issues)
    }

    /// Number of issues across every category.
    pub fn total_count(&self) -> usize {
        self.all_issues().count()
    }

    /// Number of critical issues across every category.
    pub fn critical_count(&self) -> usize {
        self.all_issues()
            .filter(|i| i.severity == ContinuitySeverity::Critical)
            .count()
    }
}
