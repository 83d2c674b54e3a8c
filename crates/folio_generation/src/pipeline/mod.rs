//! The staged chapter pipeline.

mod state;
mod steps;

pub use state::{PipelineState, StatePatch};
pub use steps::{PipelineSteps, StepDescriptor, StepKind};

use crate::continuity::ContinuityState;
use crate::{ContextBuilder, ContinuityVerifier, QualityEvaluator, prompts};
use folio_core::{
    BookBlueprint, CancellationFlag, ChapterBlueprint, ChapterGenerationContext, ChapterStatus,
    ComprehensiveQualityReport, GeneratedChapter, GenerationConfig, GenerationOptions,
    ProgressUpdate, count_words,
};
use folio_error::{
    BackendError, FolioResult, PipelineError, PipelineErrorKind, ValidationError,
    ValidationErrorKind,
};
use folio_interface::{GenerationBackend, ProgressSink};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Revision points taken from a report per revision pass.
pub const REVISION_POINTS: usize = 5;

/// Scenes kept as rolling context for the next scene.
pub const SCENE_WINDOW: usize = 2;

/// Inputs shared by every step of one run.
struct StepInputs<'a> {
    blueprint: &'a BookBlueprint,
    chapter: &'a ChapterBlueprint,
    config: &'a GenerationConfig,
    continuity: ContinuityState,
    started: Instant,
}

/// Turns one chapter blueprint into a finished, scored [`GeneratedChapter`].
///
/// Steps run strictly in order. A required step's failure aborts the run
/// with the step's name; an optional step's failure is logged and its output
/// stays absent. Cancellation is checked before every step and every scene,
/// and a cancelled run yields no chapter.
pub struct ChapterPipeline<B: GenerationBackend + ?Sized> {
    backend: Arc<B>,
    context_builder: ContextBuilder<B>,
    evaluator: QualityEvaluator<B>,
    verifier: ContinuityVerifier<B>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl<B: GenerationBackend + ?Sized> Clone for ChapterPipeline<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            context_builder: self.context_builder.clone(),
            evaluator: self.evaluator.clone(),
            verifier: self.verifier.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<B: GenerationBackend + ?Sized> ChapterPipeline<B> {
    /// Create a pipeline whose components share `backend`.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            context_builder: ContextBuilder::new(Arc::clone(&backend)),
            evaluator: QualityEvaluator::new(Arc::clone(&backend)),
            verifier: ContinuityVerifier::new(Arc::clone(&backend)),
            backend,
            progress: None,
        }
    }

    /// Report per-step progress to `sink`.
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The continuity verifier this pipeline uses.
    pub fn verifier(&self) -> &ContinuityVerifier<B> {
        &self.verifier
    }

    /// Generate `chapter_number` of `blueprint`.
    ///
    /// `prior_chapters` supplies narrative, character state and plot events;
    /// only successful chapters numbered below `chapter_number` are used.
    ///
    /// # Errors
    ///
    /// - [`ValidationErrorKind::NoBlueprintForChapter`] for an unknown chapter
    /// - [`PipelineErrorKind::StepFailed`] when a required step fails
    /// - a cancellation error when `cancel` fires; check
    ///   [`folio_error::FolioError::is_cancelled`]
    #[instrument(skip(self, blueprint, prior_chapters, cancel), fields(chapter = chapter_number))]
    pub async fn run(
        &self,
        blueprint: &BookBlueprint,
        chapter_number: u32,
        prior_chapters: &[GeneratedChapter],
        cancel: &CancellationFlag,
    ) -> FolioResult<GeneratedChapter> {
        let started = Instant::now();
        cancel.check("pipeline")?;

        let chapter = blueprint.chapter(chapter_number).ok_or_else(|| {
            ValidationError::new(ValidationErrorKind::NoBlueprintForChapter(chapter_number))
        })?;
        let config = &blueprint.generation;

        let context = self
            .context_builder
            .build(chapter_number, blueprint, prior_chapters, config)
            .await?;
        let inputs = StepInputs {
            blueprint,
            chapter,
            config,
            continuity: ContinuityState::before_chapter(blueprint, chapter_number, prior_chapters),
            started,
        };

        let steps = PipelineSteps::standard(config);
        let total = steps.len();
        let mut state =
            PipelineState::new(chapter_number).apply(StatePatch::default().with_context(context));

        for (index, step) in steps.iter().enumerate() {
            cancel.check("pipeline")?;
            let span = info_span!("step", step = %step.name(), order = step.order());
            let result = self
                .execute_step(*step.kind(), &state, &inputs, cancel)
                .instrument(span)
                .await;

            match result {
                Ok(patch) => {
                    state = state.apply(patch);
                    debug!(step = %step.name(), version = state.version(), "Step complete");
                }
                Err(e) if e.is_cancelled() => {
                    info!(step = %step.name(), "Chapter generation cancelled");
                    return Err(e);
                }
                Err(e) if *step.required() => {
                    error!(step = %step.name(), error = %e, "Required step failed");
                    return Err(PipelineError::step_failed(step.name().clone(), e).into());
                }
                Err(e) => {
                    warn!(step = %step.name(), error = %e, "Optional step failed; continuing");
                }
            }

            if let Some(sink) = &self.progress {
                sink.report(&ProgressUpdate::step(
                    chapter_number,
                    step.name().clone(),
                    index + 1,
                    total,
                    started.elapsed(),
                ));
            }
        }

        let chapter = self.finish(state, chapter, config);
        info!(
            status = %chapter.status(),
            words = chapter.word_count(),
            revisions = chapter.revision_count(),
            "Chapter generated"
        );
        Ok(chapter)
    }

    fn finish(
        &self,
        state: PipelineState,
        chapter: &ChapterBlueprint,
        config: &GenerationConfig,
    ) -> GeneratedChapter {
        let status = match state.quality_report() {
            Some(report) if report.overall_score >= *config.approval_threshold() => {
                ChapterStatus::Approved
            }
            _ => ChapterStatus::NeedsReview,
        };
        GeneratedChapter::builder()
            .chapter_number(chapter.number)
            .title(chapter.title.clone())
            .content(state.content().clone().unwrap_or_default())
            .word_count(*state.word_count())
            .status(status)
            .quality_report(state.quality_report().clone())
            .continuity_report(state.continuity_report().clone())
            .outline(state.outline().clone())
            .revision_count(*state.revision_count())
            .generation_time(*state.generation_time())
            .build()
    }

    async fn execute_step(
        &self,
        kind: StepKind,
        state: &PipelineState,
        inputs: &StepInputs<'_>,
        cancel: &CancellationFlag,
    ) -> FolioResult<StatePatch> {
        match kind {
            StepKind::BuildContext => self.build_context(state),
            StepKind::GenerateOutline => self.generate_outline(state, inputs).await,
            StepKind::GenerateScenes => self.generate_scenes(state, inputs, cancel).await,
            StepKind::AssembleChapter => self.assemble_chapter(state),
            StepKind::ContinuityCheck => self.continuity_check(state, inputs).await,
            StepKind::StyleConsistencyCheck => {
                debug!("Style is scored by the quality evaluation's Style dimension");
                Ok(StatePatch::default())
            }
            StepKind::QualityEvaluation => self.quality_evaluation(state, inputs).await,
            StepKind::Revision => self.revise(state, inputs, cancel).await,
            StepKind::Finalize => self.finalize(state, inputs),
        }
    }

    fn build_context(&self, state: &PipelineState) -> FolioResult<StatePatch> {
        if state.context().is_none() {
            return Err(PipelineError::new(PipelineErrorKind::MissingContext).into());
        }
        Ok(StatePatch::default())
    }

    async fn generate_outline(
        &self,
        state: &PipelineState,
        inputs: &StepInputs<'_>,
    ) -> FolioResult<StatePatch> {
        let context = required_context(state)?;
        let prompt = prompts::outline_prompt(context, inputs.chapter);
        let options = GenerationOptions::text(*inputs.config.temperature(), 1_500);
        debug!(prompt_chars = prompt.len(), "Requesting outline");
        let outline = self.backend.generate(&prompt, &options).await?;
        Ok(StatePatch::default().with_outline(outline.trim().to_string()))
    }

    async fn generate_scenes(
        &self,
        state: &PipelineState,
        inputs: &StepInputs<'_>,
        cancel: &CancellationFlag,
    ) -> FolioResult<StatePatch> {
        let context = required_context(state)?;
        let chapter = inputs.chapter;
        let temperature = *inputs.config.temperature();

        if chapter.scenes.is_empty() {
            let prompt = prompts::chapter_prompt(context, chapter);
            let options =
                GenerationOptions::text(temperature, chapter.target_word_count.saturating_mul(2));
            debug!(prompt_chars = prompt.len(), "Requesting whole chapter");
            let text = self.backend.generate(&prompt, &options).await?;
            if text.trim().is_empty() {
                return Err(BackendError::new("Backend returned an empty chapter").into());
            }
            return Ok(StatePatch::default().with_scenes(vec![text.trim().to_string()]));
        }

        let scene_count = u32::try_from(chapter.scenes.len()).unwrap_or(u32::MAX);
        let default_target = (chapter.target_word_count / scene_count).max(1);
        let mut generated: Vec<String> = Vec::new();
        for (index, scene) in chapter.scenes.iter().enumerate() {
            cancel.check("scene generation")?;
            let target = scene.target_word_count.unwrap_or(default_target);
            let window_start = generated.len().saturating_sub(SCENE_WINDOW);
            let prompt = prompts::scene_prompt(
                context,
                chapter,
                scene,
                index,
                &generated[window_start..],
                target,
            );
            let options = GenerationOptions::text(temperature, target.saturating_mul(2));
            match self.backend.generate(&prompt, &options).await {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(scene = index + 1, chars = text.len(), "Scene generated");
                    generated.push(text.trim().to_string());
                }
                Ok(_) => warn!(scene = index + 1, "Scene came back empty; skipping"),
                Err(e) => warn!(scene = index + 1, error = %e, "Scene generation failed; skipping"),
            }
        }
        Ok(StatePatch::default().with_scenes(generated))
    }

    fn assemble_chapter(&self, state: &PipelineState) -> FolioResult<StatePatch> {
        if state.scenes().is_empty() {
            return Err(PipelineError::new(PipelineErrorKind::NoScenesToAssemble).into());
        }
        Ok(StatePatch::default().with_content(state.scenes().join("\n\n")))
    }

    async fn continuity_check(
        &self,
        state: &PipelineState,
        inputs: &StepInputs<'_>,
    ) -> FolioResult<StatePatch> {
        let content = required_content(state)?;
        let report = self
            .verifier
            .verify(content, *state.chapter_number(), &inputs.continuity, inputs.config)
            .await?;
        Ok(StatePatch::default().with_continuity_report(report))
    }

    async fn quality_evaluation(
        &self,
        state: &PipelineState,
        inputs: &StepInputs<'_>,
    ) -> FolioResult<StatePatch> {
        let content = required_content(state)?;
        let report = self
            .evaluator
            .evaluate(content, inputs.chapter, inputs.blueprint, inputs.config)
            .await?;
        Ok(StatePatch::default().with_quality_report(report))
    }

    /// Revise while the score is under the threshold and passes remain,
    /// re-evaluating after each pass. The pass count never exceeds
    /// `max_revisions` whatever the scores.
    async fn revise(
        &self,
        state: &PipelineState,
        inputs: &StepInputs<'_>,
        cancel: &CancellationFlag,
    ) -> FolioResult<StatePatch> {
        let Some(initial_report) = state.quality_report() else {
            debug!("No quality report; skipping revision");
            return Ok(StatePatch::default());
        };
        let context = required_context(state)?;
        let threshold = *inputs.config.quality_threshold();
        let max_revisions = *inputs.config.max_revisions();

        let mut content = required_content(state)?.to_string();
        let mut report = initial_report.clone();
        let mut count = *state.revision_count();
        let mut patch = StatePatch::default();

        while report.overall_score < threshold && count < max_revisions {
            cancel.check("revision")?;
            let points = revision_points(&report);
            let prompt = prompts::revision_prompt(context, &content, &points);
            let max_tokens = self
                .backend
                .estimate_tokens(&content)
                .saturating_mul(2)
                .max(1);
            let options = GenerationOptions::text(
                *inputs.config.temperature(),
                u32::try_from(max_tokens).unwrap_or(u32::MAX),
            );

            let revised = match self.backend.generate(&prompt, &options).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => {
                    let e = BackendError::new("Backend returned an empty revision");
                    if patch.is_empty() {
                        return Err(e.into());
                    }
                    warn!(error = %e, "Keeping earlier revision");
                    break;
                }
                Err(e) => {
                    if patch.is_empty() {
                        return Err(e);
                    }
                    warn!(error = %e, "Revision failed; keeping earlier revision");
                    break;
                }
            };

            count += 1;
            content = revised;
            patch = patch
                .with_content(content.clone())
                .with_revision_count(count);
            match self
                .evaluator
                .evaluate(&content, inputs.chapter, inputs.blueprint, inputs.config)
                .await
            {
                Ok(next) => report = next,
                Err(e) => {
                    warn!(error = %e, "Re-evaluation failed; stopping revisions");
                    break;
                }
            }
            info!(
                revision = count,
                score = report.overall_score,
                "Revision pass complete"
            );
            patch = patch.with_quality_report(report.clone());
        }
        Ok(patch)
    }

    fn finalize(&self, state: &PipelineState, inputs: &StepInputs<'_>) -> FolioResult<StatePatch> {
        let content = state
            .content()
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PipelineError::new(PipelineErrorKind::EmptyContent))?;
        Ok(StatePatch::default()
            .with_word_count(count_words(content))
            .with_generation_time(inputs.started.elapsed()))
    }
}

fn required_context(state: &PipelineState) -> FolioResult<&ChapterGenerationContext> {
    state
        .context()
        .as_ref()
        .ok_or_else(|| PipelineError::new(PipelineErrorKind::MissingContext).into())
}

fn required_content(state: &PipelineState) -> FolioResult<&str> {
    state
        .content()
        .as_deref()
        .ok_or_else(|| PipelineError::new(PipelineErrorKind::EmptyContent).into())
}

/// The top revision instructions, or when there are none the most severe issues.
pub fn revision_points(report: &ComprehensiveQualityReport) -> Vec<String> {
    if !report.revision_instructions.is_empty() {
        let mut instructions: Vec<_> = report.revision_instructions.iter().collect();
        instructions.sort_by_key(|i| i.priority);
        return instructions
            .into_iter()
            .take(REVISION_POINTS)
            .map(|i| match &i.current_excerpt {
                Some(excerpt) => format!("{} (at: \"{}\")", i.instruction, excerpt),
                None => format!("{} ({})", i.instruction, i.target_location),
            })
            .collect();
    }
    let points: Vec<String> = report
        .issues_by_severity()
        .into_iter()
        .take(REVISION_POINTS)
        .map(|i| match &i.suggestion {
            Some(suggestion) => format!("{}: {} {}", i.dimension, i.description, suggestion),
            None => format!("{}: {}", i.dimension, i.description),
        })
        .collect();
    if points.is_empty() {
        vec!["Strengthen prose, pacing and characterization throughout.".to_string()]
    } else {
        points
    }
}
