//! Progress updates pushed to an optional sink.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a progress update is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum ProgressScope {
    /// Steps of one chapter pipeline
    Step,
    /// Chapters of a session
    Chapter,
}

/// A single progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ProgressUpdate {
    /// Step or chapter counting
    scope: ProgressScope,
    /// Step name or chapter title
    label: String,
    /// Chapter the update concerns
    chapter_number: u32,
    /// Position within the total
    current: usize,
    /// Number of units in the run
    total: usize,
    /// `current / total * 100`, 0 when total is 0
    percentage: f64,
    /// Human readable message
    message: String,
    /// Time since the run started
    elapsed: Duration,
    /// Words generated so far in the run
    words_generated: usize,
}

fn percentage(current: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        current as f64 / total as f64 * 100.0
    }
}

impl ProgressUpdate {
    /// Progress through the steps of one chapter.
    pub fn step(
        chapter_number: u32,
        step_name: impl Into<String>,
        index: usize,
        total: usize,
        elapsed: Duration,
    ) -> Self {
        let label = step_name.into();
        Self {
            scope: ProgressScope::Step,
            message: format!("Chapter {chapter_number}: {label} ({index}/{total})"),
            label,
            chapter_number,
            current: index,
            total,
            percentage: percentage(index, total),
            elapsed,
            words_generated: 0,
        }
    }

    /// Progress through the chapters of a session, reported before a chapter starts.
    pub fn chapter(
        chapter_number: u32,
        title: impl Into<String>,
        completed: usize,
        total: usize,
        elapsed: Duration,
        words_generated: usize,
    ) -> Self {
        let label = title.into();
        Self {
            scope: ProgressScope::Chapter,
            message: format!("Generating chapter {chapter_number}: {label}"),
            label,
            chapter_number,
            current: completed,
            total,
            percentage: percentage(completed, total),
            elapsed,
            words_generated,
        }
    }
}
