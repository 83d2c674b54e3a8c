//! Chapter pipeline tests against a scripted backend.

mod test_utils;

use folio_core::{CancellationFlag, ChapterStatus, ProgressScope};
use folio_error::{FolioError, FolioErrorKind, PipelineErrorKind, ValidationErrorKind};
use folio_generation::{ChannelProgressSink, ChapterPipeline, PromptTask};
use std::sync::Arc;
use test_utils::{CHAPTER_TEXT, REVISED_TEXT, SCENE_TEXT, ScriptedBackend, harbor_blueprint};

fn failed_step<'a>(err: &'a FolioError, expected: &str) -> &'a FolioError {
    match err.kind() {
        FolioErrorKind::Pipeline(e) => {
            match &e.kind {
                PipelineErrorKind::StepFailed { step, .. } => assert_eq!(step, expected),
                other => panic!("unexpected pipeline error: {other}"),
            }
            e.cause().expect("failed step keeps its cause")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn high_scoring_chapter_is_approved_without_revision() {
    let backend = Arc::new(ScriptedBackend::scoring(88.0));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let chapter = pipeline
        .run(&harbor_blueprint(), 1, &[], &CancellationFlag::new())
        .await
        .unwrap();

    assert_eq!(*chapter.status(), ChapterStatus::Approved);
    assert_eq!(chapter.content(), CHAPTER_TEXT);
    assert_eq!(*chapter.revision_count(), 0);
    assert_eq!(*chapter.word_count(), folio_core::count_words(CHAPTER_TEXT));
    assert!(chapter.outline().is_some());
    assert!(*chapter.continuity_report().as_ref().unwrap().passes());
    assert_eq!(backend.count(PromptTask::Chapter), 1);
    assert_eq!(backend.count(PromptTask::QualityDimension), 6);
    assert_eq!(backend.count(PromptTask::Revision), 0);
}

#[tokio::test]
async fn revisions_never_exceed_the_configured_maximum() {
    let backend = Arc::new(ScriptedBackend::scoring(40.0));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));
    let blueprint = harbor_blueprint();

    let chapter = pipeline
        .run(&blueprint, 1, &[], &CancellationFlag::new())
        .await
        .unwrap();

    let max = *blueprint.generation.max_revisions();
    assert_eq!(*chapter.revision_count(), max);
    assert_eq!(backend.count(PromptTask::Revision), max as usize);
    assert_eq!(*chapter.status(), ChapterStatus::NeedsReview);
    assert_eq!(chapter.content(), REVISED_TEXT);
}

#[tokio::test]
async fn revision_stops_once_the_threshold_is_met() {
    let backend = Arc::new(ScriptedBackend::with_scores(vec![55.0, 82.0]));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let chapter = pipeline
        .run(&harbor_blueprint(), 1, &[], &CancellationFlag::new())
        .await
        .unwrap();

    assert_eq!(*chapter.revision_count(), 1);
    assert_eq!(*chapter.status(), ChapterStatus::Approved);
    assert!((chapter.quality_score().unwrap() - 82.0).abs() < 1e-9);
    // six dimensions before and after the single revision
    assert_eq!(backend.count(PromptTask::QualityDimension), 12);
}

#[tokio::test]
async fn chapter_without_quality_report_needs_review() {
    let backend = Arc::new(ScriptedBackend::scoring(95.0));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));
    let mut blueprint = harbor_blueprint();
    blueprint.generation = blueprint
        .generation
        .clone()
        .with_enable_quality_evaluation(false);

    let chapter = pipeline
        .run(&blueprint, 1, &[], &CancellationFlag::new())
        .await
        .unwrap();

    assert!(chapter.quality_report().is_none());
    assert_eq!(*chapter.status(), ChapterStatus::NeedsReview);
    assert_eq!(backend.count(PromptTask::QualityDimension), 0);
    assert_eq!(backend.count(PromptTask::Revision), 0);
}

#[tokio::test]
async fn scenes_carry_a_rolling_window_of_prior_scenes() {
    let backend = Arc::new(ScriptedBackend::scoring(80.0));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let chapter = pipeline
        .run(&harbor_blueprint(), 2, &[], &CancellationFlag::new())
        .await
        .unwrap();

    let prompts = backend.prompts(PromptTask::Scene);
    assert_eq!(prompts.len(), 3);
    assert!(!prompts[0].contains("PRECEDING SCENES"));
    assert_eq!(prompts[2].matches(SCENE_TEXT).count(), 2);
    assert_eq!(chapter.content(), &[SCENE_TEXT; 3].join("\n\n"));
    assert_eq!(backend.count(PromptTask::Chapter), 0);
}

#[tokio::test]
async fn failed_scene_generation_fails_the_chapter_at_assembly() {
    let backend = Arc::new(ScriptedBackend::scoring(80.0).failing(PromptTask::Scene));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let err = pipeline
        .run(&harbor_blueprint(), 2, &[], &CancellationFlag::new())
        .await
        .unwrap_err();

    let cause = failed_step(&err, "AssembleChapter");
    match cause.kind() {
        FolioErrorKind::Pipeline(e) => assert_eq!(e.kind, PipelineErrorKind::NoScenesToAssemble),
        other => panic!("unexpected cause: {other}"),
    }
    assert_eq!(backend.count(PromptTask::Scene), 3);
    assert_eq!(backend.count(PromptTask::QualityDimension), 0);
}

#[tokio::test]
async fn backend_failure_in_a_required_step_is_kept_as_the_cause() {
    let backend = Arc::new(ScriptedBackend::scoring(80.0).failing(PromptTask::Outline));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let err = pipeline
        .run(&harbor_blueprint(), 1, &[], &CancellationFlag::new())
        .await
        .unwrap_err();

    let cause = failed_step(&err, "GenerateOutline");
    assert!(matches!(cause.kind(), FolioErrorKind::Backend(_)));
    assert_eq!(backend.count(PromptTask::Chapter), 0);
}

#[tokio::test]
async fn optional_step_failure_leaves_its_report_absent() {
    let backend = Arc::new(ScriptedBackend::scoring(80.0).failing(PromptTask::Continuity));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let chapter = pipeline
        .run(&harbor_blueprint(), 1, &[], &CancellationFlag::new())
        .await
        .unwrap();

    assert!(chapter.continuity_report().is_none());
    assert!(chapter.quality_report().is_some());
    assert_eq!(*chapter.status(), ChapterStatus::Approved);
}

#[tokio::test]
async fn malformed_continuity_response_counts_as_clean() {
    let backend = Arc::new(
        ScriptedBackend::scoring(80.0).with_continuity_response("Everything looks consistent!"),
    );
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let chapter = pipeline
        .run(&harbor_blueprint(), 1, &[], &CancellationFlag::new())
        .await
        .unwrap();

    let report = chapter.continuity_report().as_ref().unwrap();
    assert_eq!(report.total_count(), 0);
    assert_eq!(*report.score(), 100.0);
}

#[tokio::test]
async fn critical_continuity_issue_fails_the_check() {
    let backend = Arc::new(ScriptedBackend::scoring(80.0).with_continuity_response(
        r#"{"issues": [{"severity": "critical", "description": "Tomas was declared dead"}]}"#,
    ));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let chapter = pipeline
        .run(&harbor_blueprint(), 1, &[], &CancellationFlag::new())
        .await
        .unwrap();

    let report = chapter.continuity_report().as_ref().unwrap();
    // the same response is returned for all four checked categories
    assert_eq!(report.critical_count(), 4);
    assert!(!*report.passes());
}

#[tokio::test]
async fn every_step_reports_progress() {
    let backend = Arc::new(ScriptedBackend::scoring(90.0));
    let (sink, mut updates) = ChannelProgressSink::new();
    let pipeline = ChapterPipeline::new(Arc::clone(&backend)).with_progress_sink(Arc::new(sink));

    pipeline
        .run(&harbor_blueprint(), 1, &[], &CancellationFlag::new())
        .await
        .unwrap();

    let mut indices = Vec::new();
    while let Ok(update) = updates.try_recv() {
        assert_eq!(*update.scope(), ProgressScope::Step);
        assert_eq!(*update.total(), 9);
        indices.push(*update.current());
    }
    assert_eq!(indices, (1..=9).collect::<Vec<_>>());
}

#[tokio::test]
async fn unknown_chapter_is_rejected() {
    let backend = Arc::new(ScriptedBackend::scoring(80.0));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));

    let err = pipeline
        .run(&harbor_blueprint(), 9, &[], &CancellationFlag::new())
        .await
        .unwrap_err();

    match err.kind() {
        FolioErrorKind::Validation(e) => {
            assert_eq!(e.kind, ValidationErrorKind::NoBlueprintForChapter(9))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn cancelled_run_yields_no_chapter() {
    let backend = Arc::new(ScriptedBackend::scoring(80.0));
    let pipeline = ChapterPipeline::new(Arc::clone(&backend));
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = pipeline
        .run(&harbor_blueprint(), 1, &[], &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(backend.total_calls(), 0);
}
