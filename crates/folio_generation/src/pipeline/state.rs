//! Versioned pipeline state and the patches steps return.

use derive_getters::Getters;
use folio_core::{ChapterGenerationContext, ComprehensiveQualityReport, ContinuityReport};
use std::time::Duration;

/// Working state of one pipeline run.
///
/// Steps never mutate it; each returns a [`StatePatch`] and the pipeline
/// produces the next version with [`PipelineState::apply`].
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct PipelineState {
    /// Incremented on every applied patch
    version: u64,
    /// Chapter being produced
    chapter_number: u32,
    /// Prompt context
    context: Option<ChapterGenerationContext>,
    /// Scene outline
    outline: Option<String>,
    /// Generated scene texts, in order
    scenes: Vec<String>,
    /// Assembled or revised chapter text
    content: Option<String>,
    /// Continuity report
    continuity_report: Option<ContinuityReport>,
    /// Quality report for the current content
    quality_report: Option<ComprehensiveQualityReport>,
    /// Revision passes applied
    revision_count: u32,
    /// Word count of the final content
    word_count: usize,
    /// Time spent up to finalization
    generation_time: Duration,
}

impl PipelineState {
    /// Empty state for `chapter_number`.
    pub fn new(chapter_number: u32) -> Self {
        Self {
            version: 0,
            chapter_number,
            context: None,
            outline: None,
            scenes: Vec::new(),
            content: None,
            continuity_report: None,
            quality_report: None,
            revision_count: 0,
            word_count: 0,
            generation_time: Duration::ZERO,
        }
    }

    /// Produce the next version with `patch` applied.
    pub fn apply(mut self, patch: StatePatch) -> Self {
        if patch.is_empty() {
            return self;
        }
        if let Some(context) = patch.context {
            self.context = Some(context);
        }
        if let Some(outline) = patch.outline {
            self.outline = Some(outline);
        }
        if let Some(scenes) = patch.scenes {
            self.scenes = scenes;
        }
        if let Some(content) = patch.content {
            self.content = Some(content);
        }
        if let Some(report) = patch.continuity_report {
            self.continuity_report = Some(report);
        }
        if let Some(report) = patch.quality_report {
            self.quality_report = Some(report);
        }
        if let Some(count) = patch.revision_count {
            self.revision_count = count;
        }
        if let Some(words) = patch.word_count {
            self.word_count = words;
        }
        if let Some(elapsed) = patch.generation_time {
            self.generation_time = elapsed;
        }
        self.version += 1;
        self
    }
}

/// Fields a step changes; `None` leaves the state's value as it is.
#[derive(Debug, Clone, Default, PartialEq, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct StatePatch {
    /// New context
    pub context: Option<ChapterGenerationContext>,
    /// New outline
    pub outline: Option<String>,
    /// Replacement scene list
    pub scenes: Option<Vec<String>>,
    /// Replacement content
    pub content: Option<String>,
    /// New continuity report
    pub continuity_report: Option<ContinuityReport>,
    /// New quality report
    pub quality_report: Option<ComprehensiveQualityReport>,
    /// New revision count
    pub revision_count: Option<u32>,
    /// Final word count
    pub word_count: Option<usize>,
    /// Final generation time
    pub generation_time: Option<Duration>,
}

impl StatePatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_a_patch_bumps_the_version() {
        let state = PipelineState::new(4);
        let state = state.apply(StatePatch::default().with_outline("1. Arrival".to_string()));
        assert_eq!(*state.version(), 1);
        assert_eq!(state.outline().as_deref(), Some("1. Arrival"));

        let state = state.apply(
            StatePatch::default()
                .with_scenes(vec!["a".to_string(), "b".to_string()])
                .with_revision_count(1u32),
        );
        assert_eq!(*state.version(), 2);
        assert_eq!(state.scenes().len(), 2);
        assert_eq!(state.outline().as_deref(), Some("1. Arrival"));
        assert_eq!(*state.revision_count(), 1);
    }

    #[test]
    fn empty_patch_keeps_the_version() {
        let state = PipelineState::new(1).apply(StatePatch::default());
        assert_eq!(*state.version(), 0);
        assert!(StatePatch::default().is_empty());
    }
}
