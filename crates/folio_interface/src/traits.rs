//! Trait definitions for the engine's external collaborators.

use crate::SessionSummary;
use async_trait::async_trait;
use folio_core::{GenerationOptions, GenerationSession, ProgressUpdate};
use folio_error::FolioResult;

/// A text generation backend.
///
/// The engine issues exactly one call per logical request and never retries;
/// retry policy, if any, belongs to the implementation or its caller.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text for `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> FolioResult<String>;

    /// Heuristic token estimate for `text`.
    fn estimate_tokens(&self, text: &str) -> usize {
        folio_core::estimate_tokens(text)
    }

    /// Provider name (e.g., "anthropic", "openai", "gemini").
    fn provider_name(&self) -> &'static str;

    /// Model identifier.
    fn model_name(&self) -> &str;
}

/// Push-only receiver of progress updates.
///
/// No acknowledgement or backpressure; implementations must not block.
pub trait ProgressSink: Send + Sync {
    /// Receive one update.
    fn report(&self, update: &ProgressUpdate);
}

/// Storage for generation sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert or overwrite a session by id.
    async fn save_session(&self, session: &GenerationSession) -> FolioResult<()>;

    /// Load a session by id.
    async fn load_session(&self, id: uuid::Uuid) -> FolioResult<GenerationSession>;

    /// Summaries of stored sessions, optionally restricted to one blueprint,
    /// most recent first.
    async fn list_sessions(&self, blueprint_id: Option<&str>) -> FolioResult<Vec<SessionSummary>>;
}
