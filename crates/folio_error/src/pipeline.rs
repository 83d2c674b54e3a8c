//! Chapter pipeline error types.

use crate::FolioError;

/// Specific error conditions raised by pipeline steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PipelineErrorKind {
    /// A required step failed; the chapter is aborted
    #[display("Required step '{}' failed: {}", step, message)]
    StepFailed {
        /// Name of the failing step
        step: String,
        /// Underlying error message
        message: String,
    },
    /// The pipeline started without an attached generation context
    #[display("No generation context attached to pipeline state")]
    MissingContext,
    /// Scene generation produced nothing to assemble
    #[display("No scenes to assemble")]
    NoScenesToAssemble,
    /// Finalization found no chapter content
    #[display("Chapter content is empty")]
    EmptyContent,
}

/// Pipeline error with source location.
///
/// # Examples
///
/// ```
/// use folio_error::{PipelineError, PipelineErrorKind};
///
/// let err = PipelineError::new(PipelineErrorKind::EmptyContent);
/// assert!(format!("{}", err).contains("empty"));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Pipeline Error: {} at line {} in {}", kind, line, file)]
pub struct PipelineError {
    /// The specific error condition
    pub kind: PipelineErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
    /// Failure behind a `StepFailed`
    cause: Option<Box<FolioError>>,
}

impl PipelineError {
    /// Create a new PipelineError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PipelineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
            cause: None,
        }
    }

    /// Wrap the error that made required step `step` fail.
    ///
    /// ```
    /// use folio_error::{BackendError, FolioErrorKind, PipelineError};
    ///
    /// let err = PipelineError::step_failed("GenerateOutline", BackendError::new("timeout").into());
    /// assert!(matches!(err.cause().map(|c| c.kind()), Some(FolioErrorKind::Backend(_))));
    /// ```
    #[track_caller]
    pub fn step_failed(step: impl Into<String>, cause: FolioError) -> Self {
        let mut err = Self::new(PipelineErrorKind::StepFailed {
            step: step.into(),
            message: cause.to_string(),
        });
        err.cause = Some(Box::new(cause));
        err
    }

    /// The error behind a failed step, if any.
    pub fn cause(&self) -> Option<&FolioError> {
        self.cause.as_deref()
    }
}
