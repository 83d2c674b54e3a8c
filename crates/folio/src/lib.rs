//! Folio - book chapter generation engine.
//!
//! Folio turns a structured book blueprint (characters, world, plot, style,
//! chapter plans) into prose, one chapter at a time, through any text
//! generation backend. Each chapter passes through a staged pipeline with
//! continuity checking, six-dimension quality scoring and bounded revision.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use folio::{BookBlueprint, GenerationSession, SessionOrchestrator, init_observability};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_observability()?;
//!     let blueprint: BookBlueprint = serde_json::from_str(&std::fs::read_to_string("book.json")?)?;
//!     let orchestrator = SessionOrchestrator::new(Arc::new(MyBackend::new()));
//!
//!     let mut session = GenerationSession::new(blueprint.id.clone());
//!     let status = orchestrator.run(&blueprint, &mut session, None).await?;
//!     println!("{status}: {} words", session.metrics().generated_word_count);
//!     Ok(())
//! }
//! ```
//!
//! # Cargo Features
//!
//! - `otel` - Bridge spans to OpenTelemetry with a stdout exporter
//!
//! # Architecture
//!
//! - `folio_error` - Error types
//! - `folio_core` - Blueprint, chapter, report and session data
//! - `folio_interface` - Backend, progress sink and repository traits
//! - `folio_generation` - Context builder, pipeline, evaluators, orchestrator
//!
//! This crate re-exports everything for convenience.

pub use folio_core::*;
pub use folio_error::*;
pub use folio_generation::*;
pub use folio_interface::*;

mod observability;

pub use observability::{ObservabilityConfig, init_observability, init_observability_with_config};
