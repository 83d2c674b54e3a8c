//! Quality evaluation and auto-fix tests.

mod test_utils;

use folio_core::{IssueSeverity, Verdict};
use folio_error::{FolioErrorKind, PipelineErrorKind};
use folio_generation::{PromptTask, QualityEvaluator};
use std::sync::Arc;
use test_utils::{CHAPTER_TEXT, ScriptedBackend, harbor_blueprint};

#[tokio::test]
async fn every_dimension_is_scored_in_turn() {
    let backend = Arc::new(ScriptedBackend::scoring(65.0));
    let evaluator = QualityEvaluator::new(Arc::clone(&backend));
    let blueprint = harbor_blueprint();
    let chapter = blueprint.chapter(1).unwrap();

    let report = evaluator
        .evaluate(CHAPTER_TEXT, chapter, &blueprint, &blueprint.generation)
        .await
        .unwrap();

    assert_eq!(backend.count(PromptTask::QualityDimension), 6);
    assert_eq!(report.dimensions.len(), 6);
    assert!((report.overall_score - 65.0).abs() < 1e-9);
    assert_eq!(report.verdict, Verdict::Acceptable);
    assert_eq!(report.issues.len(), 6);
    assert!(
        report
            .issues
            .iter()
            .all(|i| i.severity == IssueSeverity::Minor && i.auto_fixable)
    );
}

#[tokio::test]
async fn failed_dimensions_fall_back_to_the_default_score() {
    let backend =
        Arc::new(ScriptedBackend::scoring(20.0).failing(PromptTask::QualityDimension));
    let evaluator = QualityEvaluator::new(Arc::clone(&backend));
    let blueprint = harbor_blueprint();
    let chapter = blueprint.chapter(1).unwrap();

    let report = evaluator
        .evaluate(CHAPTER_TEXT, chapter, &blueprint, &blueprint.generation)
        .await
        .unwrap();

    assert!((report.overall_score - 70.0).abs() < 1e-9);
    assert!(report.dimensions.iter().all(|d| d.weaknesses.is_empty()));
    assert!(report.issues.is_empty());
}

#[tokio::test]
async fn blank_content_is_not_evaluated() {
    let backend = Arc::new(ScriptedBackend::scoring(80.0));
    let evaluator = QualityEvaluator::new(Arc::clone(&backend));
    let blueprint = harbor_blueprint();
    let chapter = blueprint.chapter(1).unwrap();

    let err = evaluator
        .evaluate("  \n ", chapter, &blueprint, &blueprint.generation)
        .await
        .unwrap_err();

    match err.kind() {
        FolioErrorKind::Pipeline(e) => assert_eq!(e.kind, PipelineErrorKind::EmptyContent),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn auto_fix_rewrites_each_excerpt_once() {
    let backend = Arc::new(ScriptedBackend::scoring(65.0));
    let evaluator = QualityEvaluator::new(Arc::clone(&backend));
    let blueprint = harbor_blueprint();
    let chapter = blueprint.chapter(1).unwrap();
    let report = evaluator
        .evaluate(CHAPTER_TEXT, chapter, &blueprint, &blueprint.generation)
        .await
        .unwrap();

    let result = evaluator
        .auto_fix_issues(CHAPTER_TEXT, &report.issues, &blueprint.generation)
        .await;

    // every issue quotes the same passage, so only the first still finds it
    assert_eq!(result.applied.len(), 1);
    assert_eq!(result.unfixed.len(), 5);
    assert_eq!(backend.count(PromptTask::FixPassage), 1);
    assert!(result.content.starts_with("Mara ran up the stairs the lighthouse stairs."));
    assert!((result.estimated_improvement - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn major_issues_are_left_for_revision() {
    let backend = Arc::new(ScriptedBackend::scoring(45.0));
    let evaluator = QualityEvaluator::new(Arc::clone(&backend));
    let blueprint = harbor_blueprint();
    let chapter = blueprint.chapter(1).unwrap();
    let report = evaluator
        .evaluate(CHAPTER_TEXT, chapter, &blueprint, &blueprint.generation)
        .await
        .unwrap();

    let result = evaluator
        .auto_fix_issues(CHAPTER_TEXT, &report.issues, &blueprint.generation)
        .await;

    assert!(report.issues.iter().all(|i| i.severity == IssueSeverity::Major));
    assert_eq!(report.revision_instructions.len(), 6);
    assert!(result.applied.is_empty());
    assert!(result.unfixed.is_empty());
    assert_eq!(result.content, CHAPTER_TEXT);
    assert_eq!(backend.count(PromptTask::FixPassage), 0);
}
