//! In-memory implementation of SessionRepository.
//!
//! Sessions live in a HashMap behind an RwLock and are lost when the
//! repository is dropped.

use async_trait::async_trait;
use folio_core::GenerationSession;
use folio_error::{FolioResult, ValidationError, ValidationErrorKind};
use folio_interface::{SessionRepository, SessionSummary};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory repository for generation sessions.
///
/// # Example
/// ```
/// use folio_core::GenerationSession;
/// use folio_generation::InMemorySessionRepository;
/// use folio_interface::SessionRepository;
///
/// # tokio_test::block_on(async {
/// let repo = InMemorySessionRepository::new();
/// let session = GenerationSession::new("harbor-lights");
/// repo.save_session(&session).await.unwrap();
/// assert_eq!(repo.load_session(*session.id()).await.unwrap(), session);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<uuid::Uuid, GenerationSession>>>,
}

impl InMemorySessionRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn save_session(&self, session: &GenerationSession) -> FolioResult<()> {
        self.sessions
            .write()
            .await
            .insert(*session.id(), session.clone());
        Ok(())
    }

    async fn load_session(&self, id: uuid::Uuid) -> FolioResult<GenerationSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                ValidationError::new(ValidationErrorKind::SessionNotFound(id.to_string())).into()
            })
    }

    async fn list_sessions(&self, blueprint_id: Option<&str>) -> FolioResult<Vec<SessionSummary>> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<&GenerationSession> = sessions
            .values()
            .filter(|s| blueprint_id.is_none_or(|id| s.blueprint_id() == id))
            .collect();
        matching.sort_by(|a, b| b.started_at().cmp(a.started_at()));
        Ok(matching.into_iter().map(SessionSummary::from).collect())
    }
}
