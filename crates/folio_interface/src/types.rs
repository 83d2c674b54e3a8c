//! Types shared across the interface traits.

use chrono::{DateTime, Utc};
use folio_core::{GenerationSession, SessionStatus};
use serde::{Deserialize, Serialize};

/// Lightweight listing entry for a stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct SessionSummary {
    /// Session id
    id: uuid::Uuid,
    /// Blueprint the session generated
    blueprint_id: String,
    /// Session status
    status: SessionStatus,
    /// Chapters generated successfully
    completed_chapters: usize,
    /// Numbers of failed chapters
    failed_chapters: Vec<u32>,
    /// Creation time
    started_at: DateTime<Utc>,
}

impl From<&GenerationSession> for SessionSummary {
    fn from(session: &GenerationSession) -> Self {
        Self {
            id: *session.id(),
            blueprint_id: session.blueprint_id().clone(),
            status: *session.status(),
            completed_chapters: session.metrics().completed_chapters,
            failed_chapters: session.metrics().failed_chapters.clone(),
            started_at: *session.started_at(),
        }
    }
}
