//! Multi-chapter generation sessions.

use crate::GeneratedChapter;
use chrono::{DateTime, Utc};
use folio_error::{FolioResult, ValidationError, ValidationErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Session lifecycle. Transitions only leave `InProgress`.
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
pub enum SessionStatus {
    /// Chapters are being generated
    #[default]
    InProgress,
    /// Every chapter succeeded
    Completed,
    /// At least one chapter failed
    CompletedWithErrors,
    /// Stopped by request
    Cancelled,
}

impl SessionStatus {
    /// Whether the session has reached a final status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        *self == next || (*self == SessionStatus::InProgress && next.is_terminal())
    }
}

/// Inclusive chapter number range restricting a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    /// First chapter, inclusive
    pub start: u32,
    /// Last chapter, inclusive
    pub end: u32,
}

impl ChapterRange {
    /// Create a range, rejecting `start > end`.
    #[track_caller]
    pub fn new(start: u32, end: u32) -> FolioResult<Self> {
        if start > end {
            return Err(
                ValidationError::new(ValidationErrorKind::InvalidChapterRange { start, end })
                    .into(),
            );
        }
        Ok(Self { start, end })
    }

    /// Whether `chapter` falls inside the range.
    pub fn contains(&self, chapter: u32) -> bool {
        (self.start..=self.end).contains(&chapter)
    }
}

/// Aggregate session metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Chapters scheduled or already recorded
    pub total_chapters: usize,
    /// Chapters generated successfully
    pub completed_chapters: usize,
    /// Numbers of chapters that failed, ascending
    pub failed_chapters: Vec<u32>,
    /// Words across successful chapters
    pub generated_word_count: usize,
    /// Mean overall quality over chapters with a quality report
    pub average_quality_score: Option<f64>,
    /// Wall-clock time spent in the session
    pub elapsed: Duration,
}

impl SessionMetrics {
    /// Recompute every chapter-derived metric from `chapters`.
    ///
    /// `total_chapters` and `elapsed` are left as they are.
    pub fn recompute(&mut self, chapters: &[GeneratedChapter]) {
        let succeeded: Vec<&GeneratedChapter> =
            chapters.iter().filter(|c| !c.is_failed()).collect();
        self.completed_chapters = succeeded.len();
        self.failed_chapters = chapters
            .iter()
            .filter(|c| c.is_failed())
            .map(|c| *c.chapter_number())
            .collect();
        self.failed_chapters.sort_unstable();
        self.generated_word_count = succeeded.iter().map(|c| *c.word_count()).sum();
        let scores: Vec<f64> = succeeded.iter().filter_map(|c| c.quality_score()).collect();
        self.average_quality_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };
    }
}

/// One end-to-end generation run over a blueprint.
///
/// Owned by the caller; the orchestrator borrows it mutably for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct GenerationSession {
    /// Session id
    id: uuid::Uuid,
    /// Blueprint being generated
    blueprint_id: String,
    /// Lifecycle status
    status: SessionStatus,
    /// Chapter entries in chapter-number order, failures included
    chapters: Vec<GeneratedChapter>,
    /// Aggregate metrics
    metrics: SessionMetrics,
    /// Creation time
    started_at: DateTime<Utc>,
    /// When a final status was reached
    finished_at: Option<DateTime<Utc>>,
}

impl GenerationSession {
    /// Start a session for `blueprint_id`.
    pub fn new(blueprint_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            blueprint_id: blueprint_id.into(),
            status: SessionStatus::InProgress,
            chapters: Vec::new(),
            metrics: SessionMetrics::default(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next`, rejecting any transition out of a final status.
    #[track_caller]
    pub fn transition(&mut self, next: SessionStatus) -> FolioResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::new(ValidationErrorKind::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            })
            .into());
        }
        if next.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        self.status = next;
        Ok(())
    }

    /// Entry for `chapter_number`, if recorded.
    pub fn chapter(&self, chapter_number: u32) -> Option<&GeneratedChapter> {
        self.chapters
            .iter()
            .find(|c| *c.chapter_number() == chapter_number)
    }

    /// Successful chapters in chapter-number order.
    pub fn successful_chapters(&self) -> Vec<GeneratedChapter> {
        self.chapters
            .iter()
            .filter(|c| !c.is_failed())
            .cloned()
            .collect()
    }

    /// Insert or replace the entry for the chapter's number, keeping order,
    /// then recompute metrics.
    pub fn record_chapter(&mut self, chapter: GeneratedChapter) {
        let number = *chapter.chapter_number();
        match self
            .chapters
            .iter()
            .position(|c| *c.chapter_number() == number)
        {
            Some(index) => self.chapters[index] = chapter,
            None => {
                let index = self
                    .chapters
                    .iter()
                    .position(|c| *c.chapter_number() > number)
                    .unwrap_or(self.chapters.len());
                self.chapters.insert(index, chapter);
            }
        }
        self.metrics.recompute(&self.chapters);
    }

    /// Replace the entry for an already recorded chapter.
    #[track_caller]
    pub fn replace_chapter(&mut self, chapter: GeneratedChapter) -> FolioResult<()> {
        let number = *chapter.chapter_number();
        if self.chapter(number).is_none() {
            return Err(ValidationError::new(ValidationErrorKind::ChapterNotInSession(number)).into());
        }
        self.record_chapter(chapter);
        Ok(())
    }

    /// Schedule chapters for a run.
    ///
    /// The total counts the scheduled numbers together with every chapter
    /// already recorded, so completed and failed entries never exceed it.
    pub fn schedule_chapters(&mut self, numbers: impl IntoIterator<Item = u32>) {
        let mut all: BTreeSet<u32> = self.chapters.iter().map(|c| *c.chapter_number()).collect();
        all.extend(numbers);
        self.metrics.total_chapters = all.len();
    }

    /// Add to the session's elapsed time.
    pub fn add_elapsed(&mut self, elapsed: Duration) {
        self.metrics.elapsed += elapsed;
    }

    /// Overwrite the session's elapsed time.
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.metrics.elapsed = elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChapterStatus;

    fn chapter(number: u32, words: usize, status: ChapterStatus) -> GeneratedChapter {
        GeneratedChapter::builder()
            .chapter_number(number)
            .word_count(words)
            .status(status)
            .build()
    }

    #[test]
    fn status_is_monotonic() {
        let mut session = GenerationSession::new("book");
        session.transition(SessionStatus::Completed).unwrap();
        assert!(session.finished_at().is_some());

        let err = session.transition(SessionStatus::InProgress).unwrap_err();
        assert!(err.to_string().contains("InProgress"));
        assert!(session.transition(SessionStatus::Cancelled).is_err());
        assert_eq!(*session.status(), SessionStatus::Completed);
    }

    #[test]
    fn record_keeps_chapter_order_and_metrics() {
        let mut session = GenerationSession::new("book");
        session.record_chapter(chapter(3, 300, ChapterStatus::Approved));
        session.record_chapter(chapter(1, 100, ChapterStatus::NeedsReview));
        session.record_chapter(chapter(2, 0, ChapterStatus::Failed));

        let numbers: Vec<u32> = session.chapters().iter().map(|c| *c.chapter_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(session.metrics().completed_chapters, 2);
        assert_eq!(session.metrics().failed_chapters, vec![2]);
        assert_eq!(session.metrics().generated_word_count, 400);
        assert_eq!(session.metrics().average_quality_score, None);
    }

    #[test]
    fn replace_requires_existing_entry() {
        let mut session = GenerationSession::new("book");
        assert!(session.replace_chapter(chapter(4, 10, ChapterStatus::Approved)).is_err());

        session.record_chapter(chapter(4, 0, ChapterStatus::Failed));
        session
            .replace_chapter(chapter(4, 10, ChapterStatus::Approved))
            .unwrap();
        assert_eq!(session.chapters().len(), 1);
        assert!(session.metrics().failed_chapters.is_empty());
    }

    #[test]
    fn schedule_counts_recorded_chapters_once() {
        let mut session = GenerationSession::new("book");
        session.record_chapter(chapter(1, 100, ChapterStatus::Approved));
        session.record_chapter(chapter(5, 0, ChapterStatus::Failed));

        session.schedule_chapters([2, 3, 5]);
        assert_eq!(session.metrics().total_chapters, 4);
        assert!(session.metrics().completed_chapters <= session.metrics().total_chapters);
    }

    #[test]
    fn range_rejects_reversed_bounds() {
        assert!(ChapterRange::new(3, 1).is_err());
        let range = ChapterRange::new(2, 4).unwrap();
        assert!(range.contains(2) && range.contains(4));
        assert!(!range.contains(5));
    }
}
