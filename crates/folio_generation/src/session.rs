//! Multi-chapter session orchestration.

use crate::ChapterPipeline;
use folio_core::{
    BookBlueprint, CancellationFlag, ChapterBlueprint, ChapterRange, CharacterProfile,
    GeneratedChapter, GenerationSession, ProgressUpdate, SessionStatus,
};
use folio_error::{FolioResult, ValidationError, ValidationErrorKind};
use folio_interface::{GenerationBackend, ProgressSink, SessionRepository};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Interval between checks while a session is paused.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pause, resume and cancel handle for a running session.
///
/// Clones share state, so a clone handed to another task controls the
/// orchestrator it came from. A cancel request stops the run in progress;
/// each new run starts with the request cleared.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    paused: Arc<AtomicBool>,
    cancel: CancellationFlag,
}

impl SessionControl {
    /// A control that is neither paused nor cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the session before its next chapter.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Let a paused session continue.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Stop the session at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the session is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The flag shared with the chapter pipeline.
    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancel
    }

    fn begin_run(&self) {
        if self.cancel.is_cancelled() {
            debug!("Clearing cancel request left by an earlier run");
        }
        self.cancel.reset();
    }
}

/// Drives the chapter pipeline across a blueprint's chapters.
///
/// Chapters run one at a time in ascending order. Each successful chapter is
/// enriched with a summary, key events and character states so that later
/// chapters see it as context. A failed chapter is recorded and the session
/// moves on.
///
/// # Example
///
/// ```no_run
/// use folio_core::{BookBlueprint, GenerationSession};
/// use folio_generation::SessionOrchestrator;
/// use folio_interface::GenerationBackend;
/// use std::sync::Arc;
///
/// # async fn demo(backend: Arc<dyn GenerationBackend>, blueprint: BookBlueprint) -> folio_error::FolioResult<()> {
/// let orchestrator = SessionOrchestrator::new(backend);
/// let mut session = GenerationSession::new(blueprint.id.clone());
/// let status = orchestrator.run(&blueprint, &mut session, None).await?;
/// println!("{status}: {} chapters", session.metrics().completed_chapters);
/// # Ok(())
/// # }
/// ```
pub struct SessionOrchestrator<B: GenerationBackend + ?Sized> {
    pipeline: ChapterPipeline<B>,
    progress: Option<Arc<dyn ProgressSink>>,
    repository: Option<Arc<dyn SessionRepository>>,
    control: SessionControl,
}

impl<B: GenerationBackend + ?Sized> Clone for SessionOrchestrator<B> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            progress: self.progress.clone(),
            repository: self.repository.clone(),
            control: self.control.clone(),
        }
    }
}

impl<B: GenerationBackend + ?Sized> SessionOrchestrator<B> {
    /// Create an orchestrator over `backend`.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            pipeline: ChapterPipeline::new(backend),
            progress: None,
            repository: None,
            control: SessionControl::new(),
        }
    }

    /// Report chapter and step progress to `sink`.
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.pipeline = self.pipeline.with_progress_sink(Arc::clone(&sink));
        self.progress = Some(sink);
        self
    }

    /// Save the session to `repository` after every chapter.
    pub fn with_repository(mut self, repository: Arc<dyn SessionRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Use an existing control handle.
    pub fn with_control(mut self, control: SessionControl) -> Self {
        self.control = control;
        self
    }

    /// Handle for pausing, resuming and cancelling runs.
    pub fn control(&self) -> &SessionControl {
        &self.control
    }

    /// Generate the blueprint's chapters into `session`, optionally only those
    /// in `range`.
    ///
    /// Chapters the session already holds as successful are skipped, so an
    /// interrupted session can be resumed by running it again. A cancel
    /// request left over from an earlier run is cleared first. Returns the
    /// session's final status; per-chapter failures are recorded on the
    /// session rather than returned.
    ///
    /// # Errors
    ///
    /// - [`ValidationErrorKind::BlueprintMismatch`] when the session belongs to
    ///   another blueprint
    /// - blueprint validation errors
    /// - [`ValidationErrorKind::InvalidStatusTransition`] when the session has
    ///   already finished
    #[instrument(skip_all, fields(session = %session.id(), blueprint = %blueprint.id))]
    pub async fn run(
        &self,
        blueprint: &BookBlueprint,
        session: &mut GenerationSession,
        range: Option<ChapterRange>,
    ) -> FolioResult<SessionStatus> {
        check_blueprint(blueprint, session)?;
        blueprint.validate()?;
        if session.status().is_terminal() {
            return Err(ValidationError::new(ValidationErrorKind::InvalidStatusTransition {
                from: session.status().to_string(),
                to: SessionStatus::InProgress.to_string(),
            })
            .into());
        }

        let chapters: Vec<&ChapterBlueprint> = blueprint
            .chapters_in_order()
            .into_iter()
            .filter(|c| range.is_none_or(|r| r.contains(c.number)))
            .collect();
        session.schedule_chapters(chapters.iter().map(|c| c.number));
        info!(chapters = chapters.len(), "Starting session");

        self.control.begin_run();
        let run_started = Instant::now();
        let elapsed_before = session.metrics().elapsed;

        let mut cancelled = false;
        for chapter in chapters {
            self.wait_while_paused().await;
            session.set_elapsed(elapsed_before + run_started.elapsed());
            if self.control.is_cancelled() {
                info!(chapter = chapter.number, "Session cancelled before chapter");
                cancelled = true;
                break;
            }
            if session
                .chapter(chapter.number)
                .is_some_and(|c| !c.is_failed())
            {
                debug!(chapter = chapter.number, "Chapter already generated; skipping");
                continue;
            }

            self.report_chapter_start(chapter, session);
            let started = Instant::now();
            let prior = session.successful_chapters();
            let outcome = self.generate_chapter(blueprint, chapter, &prior).await;

            match outcome {
                Ok(generated) => {
                    info!(
                        chapter = chapter.number,
                        status = %generated.status(),
                        score = ?generated.quality_score(),
                        "Chapter recorded"
                    );
                    session.record_chapter(generated);
                }
                Err(e) if e.is_cancelled() => {
                    info!(chapter = chapter.number, "Session cancelled during chapter");
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    error!(chapter = chapter.number, error = %e, "Chapter failed");
                    session.record_chapter(GeneratedChapter::failed(
                        chapter.number,
                        chapter.title.clone(),
                        e.to_string(),
                        started.elapsed(),
                    ));
                }
            }
            session.set_elapsed(elapsed_before + run_started.elapsed());
            self.persist(session).await;
        }

        let status = if cancelled {
            SessionStatus::Cancelled
        } else if session.metrics().failed_chapters.is_empty() {
            SessionStatus::Completed
        } else {
            SessionStatus::CompletedWithErrors
        };
        session.set_elapsed(elapsed_before + run_started.elapsed());
        session.transition(status)?;
        self.persist(session).await;
        info!(
            %status,
            completed = session.metrics().completed_chapters,
            failed = session.metrics().failed_chapters.len(),
            words = session.metrics().generated_word_count,
            "Session finished"
        );
        Ok(status)
    }

    /// Re-run the pipeline for one chapter already recorded on `session` and
    /// replace its entry.
    ///
    /// The session's status is left unchanged; its metrics are recomputed.
    ///
    /// # Errors
    ///
    /// - [`ValidationErrorKind::BlueprintMismatch`] or
    ///   [`ValidationErrorKind::NoBlueprintForChapter`] for bad references
    /// - [`ValidationErrorKind::ChapterNotInSession`] when the chapter was
    ///   never recorded
    /// - the pipeline's error when regeneration fails; the old entry is kept
    #[instrument(skip(self, blueprint, session), fields(session = %session.id()))]
    pub async fn regenerate_chapter(
        &self,
        blueprint: &BookBlueprint,
        session: &mut GenerationSession,
        chapter_number: u32,
    ) -> FolioResult<GeneratedChapter> {
        check_blueprint(blueprint, session)?;
        let chapter = blueprint.chapter(chapter_number).ok_or_else(|| {
            ValidationError::new(ValidationErrorKind::NoBlueprintForChapter(chapter_number))
        })?;
        if session.chapter(chapter_number).is_none() {
            return Err(
                ValidationError::new(ValidationErrorKind::ChapterNotInSession(chapter_number))
                    .into(),
            );
        }

        self.control.begin_run();
        let started = Instant::now();
        let prior = session.successful_chapters();
        let outcome = self.generate_chapter(blueprint, chapter, &prior).await;
        session.add_elapsed(started.elapsed());
        let generated = outcome?;

        session.replace_chapter(generated.clone())?;
        self.persist(session).await;
        info!(
            chapter = chapter_number,
            status = %generated.status(),
            "Chapter regenerated"
        );
        Ok(generated)
    }

    async fn generate_chapter(
        &self,
        blueprint: &BookBlueprint,
        chapter: &ChapterBlueprint,
        prior: &[GeneratedChapter],
    ) -> FolioResult<GeneratedChapter> {
        let generated = self
            .pipeline
            .run(blueprint, chapter.number, prior, self.control.cancellation_flag())
            .await?;
        Ok(self.enrich(generated, blueprint, chapter).await)
    }

    /// Attach summary, key events and the state of every blueprint character
    /// who appears. Each extraction is optional; a failure leaves its field
    /// empty.
    async fn enrich(
        &self,
        generated: GeneratedChapter,
        blueprint: &BookBlueprint,
        chapter: &ChapterBlueprint,
    ) -> GeneratedChapter {
        let config = &blueprint.generation;
        let verifier = self.pipeline.verifier();
        let content = generated.content().clone();

        let summary = match verifier.summarize_chapter(&content, chapter, config).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(chapter = chapter.number, error = %e, "Summary extraction failed");
                None
            }
        };

        let characters: Vec<&CharacterProfile> = blueprint.characters.iter().collect();
        let snapshots = verifier
            .extract_character_states(&content, chapter.number, &characters, config)
            .await
            .unwrap_or_else(|e| {
                warn!(chapter = chapter.number, error = %e, "Character state extraction failed");
                Vec::new()
            });

        let events = verifier
            .extract_key_events(&content, config)
            .await
            .unwrap_or_else(|e| {
                warn!(chapter = chapter.number, error = %e, "Key event extraction failed");
                Vec::new()
            });

        generated.with_extractions(summary, events, snapshots)
    }

    async fn wait_while_paused(&self) {
        let mut announced = false;
        while self.control.is_paused() && !self.control.is_cancelled() {
            if !announced {
                info!("Session paused");
                announced = true;
            }
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
        }
        if announced {
            info!("Session resumed");
        }
    }

    fn report_chapter_start(&self, chapter: &ChapterBlueprint, session: &GenerationSession) {
        if let Some(sink) = &self.progress {
            let metrics = session.metrics();
            sink.report(&ProgressUpdate::chapter(
                chapter.number,
                chapter.title.clone(),
                metrics.completed_chapters,
                metrics.total_chapters,
                metrics.elapsed,
                metrics.generated_word_count,
            ));
        }
    }

    async fn persist(&self, session: &GenerationSession) {
        if let Some(repository) = &self.repository {
            if let Err(e) = repository.save_session(session).await {
                warn!(error = %e, "Failed to save session");
            }
        }
    }
}

fn check_blueprint(blueprint: &BookBlueprint, session: &GenerationSession) -> FolioResult<()> {
    if session.blueprint_id() != &blueprint.id {
        return Err(ValidationError::new(ValidationErrorKind::BlueprintMismatch {
            expected: session.blueprint_id().clone(),
            actual: blueprint.id.clone(),
        })
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_clones_share_state() {
        let control = SessionControl::new();
        let handle = control.clone();

        handle.pause();
        assert!(control.is_paused());
        handle.resume();
        assert!(!control.is_paused());

        handle.cancel();
        assert!(control.is_cancelled());
        assert!(control.cancellation_flag().check("session").is_err());
    }
}
