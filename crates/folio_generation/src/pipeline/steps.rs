//! Pipeline step descriptors.

use folio_core::GenerationConfig;
use serde::{Deserialize, Serialize};

/// The nine chapter production stages, in execution order.
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
pub enum StepKind {
    /// Confirm the prompt context is attached
    BuildContext,
    /// Scene-by-scene outline
    GenerateOutline,
    /// Scene prose, or the whole chapter in one call
    GenerateScenes,
    /// Join scenes into chapter text
    AssembleChapter,
    /// Continuity verification
    ContinuityCheck,
    /// Reserved style hook
    StyleConsistencyCheck,
    /// Quality evaluation
    QualityEvaluation,
    /// Bounded revision loop
    Revision,
    /// Word count and timing
    Finalize,
}

impl StepKind {
    /// Whether failure of this step aborts the chapter.
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            StepKind::BuildContext
                | StepKind::GenerateOutline
                | StepKind::GenerateScenes
                | StepKind::AssembleChapter
                | StepKind::Finalize
        )
    }

    /// 1-based position in the full step order.
    pub fn order(&self) -> usize {
        *self as usize + 1
    }

    /// Whether `config` enables this step.
    fn enabled(&self, config: &GenerationConfig) -> bool {
        match self {
            StepKind::ContinuityCheck => *config.enable_continuity_check(),
            StepKind::QualityEvaluation => *config.enable_quality_evaluation(),
            StepKind::Revision => *config.enable_auto_revision(),
            _ => true,
        }
    }
}

/// One entry of the step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct StepDescriptor {
    /// Which stage
    kind: StepKind,
    /// Display name
    name: String,
    /// 1-based position in the full step order
    order: usize,
    /// Failure aborts the chapter
    required: bool,
}

impl From<StepKind> for StepDescriptor {
    fn from(kind: StepKind) -> Self {
        Self {
            kind,
            name: kind.to_string(),
            order: kind.order(),
            required: kind.is_required(),
        }
    }
}

/// Factory for step lists.
pub struct PipelineSteps;

impl PipelineSteps {
    /// The standard step list; optional steps disabled in `config` are left out.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_core::GenerationConfig;
    /// use folio_generation::{PipelineSteps, StepKind};
    ///
    /// let steps = PipelineSteps::standard(&GenerationConfig::default());
    /// assert_eq!(steps.len(), 9);
    /// assert_eq!(*steps[0].kind(), StepKind::BuildContext);
    ///
    /// let lean = GenerationConfig::default().with_enable_auto_revision(false);
    /// assert_eq!(PipelineSteps::standard(&lean).len(), 8);
    /// ```
    pub fn standard(config: &GenerationConfig) -> Vec<StepDescriptor> {
        use strum::IntoEnumIterator;
        StepKind::iter()
            .filter(|kind| kind.enabled(config))
            .map(StepDescriptor::from)
            .collect()
    }
}
