//! Core data types for the Folio chapter generation engine.
//!
//! Plain values only: blueprints going in, generated chapters and sessions
//! coming out, and the reports and budgets in between. Nothing here calls a
//! backend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod blueprint;
mod chapter;
mod config;
mod context;
mod continuity;
mod control;
mod options;
mod progress;
mod quality;
mod session;
mod tokens;

pub use blueprint::{
    ActOutline, BookBlueprint, ChapterBlueprint, CharacterProfile, Location, PacingIntensity,
    PlotArchitecture, PlotThread, SceneBlueprint, StyleGuide, TimelineEntry, WorldBible,
};
pub use chapter::{ChapterStatus, CharacterStateSnapshot, GeneratedChapter, GeneratedChapterBuilder};
pub use config::{ContentRating, GenerationConfig, GenerationConfigBuilder};
pub use context::{ChapterGenerationContext, ChapterGenerationContextBuilder, TokenBudget};
pub use continuity::{
    CONTINUITY_PASS_SCORE, ContinuityCategory, ContinuityIssue, ContinuityReport,
    ContinuitySeverity, continuity_score,
};
pub use control::CancellationFlag;
pub use options::{GenerationOptions, GenerationOptionsBuilder, ResponseFormat};
pub use progress::{ProgressScope, ProgressUpdate};
pub use quality::{
    AutoFixResult, ComprehensiveQualityReport, DEFAULT_DIMENSION_SCORE, DimensionScore, Issue,
    IssueSeverity, MAX_REVISION_INSTRUCTIONS, QualityDimension, RevisionInstruction, Verdict,
    Weakness,
};
pub use session::{ChapterRange, GenerationSession, SessionMetrics, SessionStatus};
pub use tokens::{count_words, estimate_tokens};
