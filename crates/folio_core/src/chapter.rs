//! Generated chapter values.

use crate::{ComprehensiveQualityReport, ContinuityReport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle status of a generated chapter.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum ChapterStatus {
    /// Not started
    #[default]
    Pending,
    /// Pipeline running
    Generating,
    /// Quality score met the approval threshold
    Approved,
    /// No quality report, or score below the approval threshold
    NeedsReview,
    /// Pipeline failed; see `failure_reason`
    Failed,
}

/// A character's state at the end of a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStateSnapshot {
    /// Character id from the blueprint
    pub character_id: String,
    /// Display name
    pub character_name: String,
    /// Emotional state at chapter end
    pub emotional_state: String,
    /// Where the character is at chapter end
    pub location: String,
    /// Progress through the character arc, 0 to 100
    pub arc_progress: u8,
    /// Chapter the snapshot was taken after
    pub chapter_number: u32,
}

/// A chapter produced by the pipeline, or a record of its failure.
///
/// Replaced wholesale on regeneration; never patched field by field.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(setter(into), build_fn(skip))]
pub struct GeneratedChapter {
    /// Unique id
    id: uuid::Uuid,
    /// Chapter number in the blueprint
    chapter_number: u32,
    /// Chapter title
    title: String,
    /// Final prose
    content: String,
    /// Whitespace-delimited word count of `content`
    word_count: usize,
    /// Lifecycle status
    status: ChapterStatus,
    /// Quality report, when evaluation ran
    quality_report: Option<ComprehensiveQualityReport>,
    /// Continuity report, when the check ran
    continuity_report: Option<ContinuityReport>,
    /// Short summary used as context for later chapters
    summary: Option<String>,
    /// Key plot events, used as context for later chapters
    key_events: Vec<String>,
    /// End-of-chapter character states
    character_snapshots: Vec<CharacterStateSnapshot>,
    /// Revision passes applied
    revision_count: u32,
    /// Wall-clock time spent generating
    generation_time: Duration,
    /// Scene outline produced before drafting
    outline: Option<String>,
    /// Why generation failed, for `Failed` entries
    failure_reason: Option<String>,
}

impl GeneratedChapterBuilder {
    /// Build the chapter, assigning a fresh id when none was set.
    ///
    /// Missing fields take empty defaults.
    pub fn build(&self) -> GeneratedChapter {
        GeneratedChapter {
            id: self.id.unwrap_or_else(uuid::Uuid::new_v4),
            chapter_number: self.chapter_number.unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
            content: self.content.clone().unwrap_or_default(),
            word_count: self.word_count.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            quality_report: self.quality_report.clone().flatten(),
            continuity_report: self.continuity_report.clone().flatten(),
            summary: self.summary.clone().flatten(),
            key_events: self.key_events.clone().unwrap_or_default(),
            character_snapshots: self.character_snapshots.clone().unwrap_or_default(),
            revision_count: self.revision_count.unwrap_or_default(),
            generation_time: self.generation_time.unwrap_or_default(),
            outline: self.outline.clone().flatten(),
            failure_reason: self.failure_reason.clone().flatten(),
        }
    }
}

impl GeneratedChapter {
    /// Creates a new chapter builder.
    pub fn builder() -> GeneratedChapterBuilder {
        GeneratedChapterBuilder::default()
    }

    /// A `Failed` entry for a chapter that could not be generated.
    pub fn failed(
        chapter_number: u32,
        title: impl Into<String>,
        reason: impl Into<String>,
        generation_time: Duration,
    ) -> Self {
        Self::builder()
            .chapter_number(chapter_number)
            .title(title)
            .status(ChapterStatus::Failed)
            .failure_reason(Some(reason.into()))
            .generation_time(generation_time)
            .build()
    }

    /// Overall quality score, when a report exists.
    pub fn quality_score(&self) -> Option<f64> {
        self.quality_report.as_ref().map(|r| r.overall_score)
    }

    /// Whether this entry records a failure.
    pub fn is_failed(&self) -> bool {
        self.status == ChapterStatus::Failed
    }

    /// Attach post-chapter extraction results, consuming self.
    pub fn with_extractions(
        mut self,
        summary: Option<String>,
        key_events: Vec<String>,
        character_snapshots: Vec<CharacterStateSnapshot>,
    ) -> Self {
        self.summary = summary;
        self.key_events = key_events;
        self.character_snapshots = character_snapshots;
        self
    }

    /// The final paragraphs of the content, at most `count`.
    pub fn last_paragraphs(&self, count: usize) -> Vec<&str> {
        let paragraphs: Vec<&str> = self
            .content
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let start = paragraphs.len().saturating_sub(count);
        paragraphs[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_entry_carries_reason() {
        let chapter = GeneratedChapter::failed(2, "Two", "backend down", Duration::from_secs(1));
        assert!(chapter.is_failed());
        assert_eq!(chapter.failure_reason().as_deref(), Some("backend down"));
        assert_eq!(*chapter.word_count(), 0);
        assert!(chapter.quality_report().is_none());
    }

    #[test]
    fn builder_assigns_distinct_ids() {
        let a = GeneratedChapter::builder().chapter_number(1u32).build();
        let b = GeneratedChapter::builder().chapter_number(1u32).build();
        assert_ne!(a.id(), b.id());
        assert_eq!(*a.status(), ChapterStatus::Pending);
    }

    #[test]
    fn last_paragraphs_skips_blank_runs() {
        let chapter = GeneratedChapter::builder()
            .content("One.\n\n\n\nTwo.\n\nThree.\n\n")
            .build();
        assert_eq!(chapter.last_paragraphs(2), vec!["Two.", "Three."]);
        assert_eq!(chapter.last_paragraphs(10).len(), 3);
    }
}
