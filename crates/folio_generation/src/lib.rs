//! Chapter generation engine for Folio.
//!
//! Turns a [`folio_core::BookBlueprint`] into prose through any
//! [`folio_interface::GenerationBackend`]:
//!
//! - **Context assembly**: token-budgeted prompt context per chapter
//! - **Chapter pipeline**: outline, scenes, assembly, continuity, quality, revision
//! - **Quality evaluation**: six scored dimensions, issues and revision instructions
//! - **Continuity verification**: category checks against accumulated story state
//! - **Sessions**: sequential multi-chapter runs with pause, resume and cancel
//!
//! Every backend response is parsed for real; malformed responses degrade to
//! conservative defaults rather than failing the chapter.
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_core::{BookBlueprint, GenerationSession};
//! use folio_generation::{ChannelProgressSink, SessionOrchestrator};
//! use std::sync::Arc;
//!
//! # async fn example(backend: Arc<MyBackend>, blueprint: BookBlueprint) -> folio_error::FolioResult<()> {
//! let (sink, mut updates) = ChannelProgressSink::new();
//! let orchestrator = SessionOrchestrator::new(backend).with_progress_sink(Arc::new(sink));
//! tokio::spawn(async move {
//!     while let Some(update) = updates.recv().await {
//!         println!("{}", update.message());
//!     }
//! });
//!
//! let mut session = GenerationSession::new(blueprint.id.clone());
//! orchestrator.run(&blueprint, &mut session, None).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod continuity;
mod extraction;
mod in_memory_repository;
mod pipeline;
mod progress;
mod prompts;
mod quality;
mod session;

pub use config::FolioConfig;
pub use context::{
    ContextBuilder, NARRATIVE_WINDOW, TRAILING_PARAGRAPHS, TRUNCATION_MARKER,
    relevant_characters, relevant_locations, truncate_middle,
};
pub use continuity::{
    ContinuityState, ContinuityVerifier, MAX_KEY_EVENTS, parse_arc_progress, parse_key_events,
};
pub use extraction::{extract_json, parse_json, parse_response};
pub use in_memory_repository::InMemorySessionRepository;
pub use pipeline::{
    ChapterPipeline, PipelineState, PipelineSteps, REVISION_POINTS, SCENE_WINDOW, StatePatch,
    StepDescriptor, StepKind, revision_points,
};
pub use progress::ChannelProgressSink;
pub use prompts::{EVALUATION_EXCERPT_CHARS, PromptTask};
pub use quality::{QualityEvaluator, build_report, extract_issues, revision_instructions};
pub use session::{PAUSE_POLL_INTERVAL, SessionControl, SessionOrchestrator};
