//! Trait definitions for the Folio chapter generation engine.
//!
//! The engine talks to the outside world only through these seams: a text
//! generation backend, an optional progress sink, and an optional session
//! store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;
mod types;

pub use traits::{GenerationBackend, ProgressSink, SessionRepository};
pub use types::SessionSummary;
