//! Validation error types.

/// Specific validation failures for blueprint, chapter, and session references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ValidationErrorKind {
    /// No chapter blueprint exists for the requested chapter number
    #[display("No chapter blueprint for chapter {}", _0)]
    NoBlueprintForChapter(u32),
    /// Two chapter blueprints share a chapter number
    #[display("Chapter number {} appears more than once in the blueprint", _0)]
    DuplicateChapterNumber(u32),
    /// The session was started for a different blueprint
    #[display("Session belongs to blueprint '{}', not '{}'", expected, actual)]
    BlueprintMismatch {
        /// Blueprint id recorded on the session
        expected: String,
        /// Blueprint id that was supplied
        actual: String,
    },
    /// A session status change would move backwards
    #[display("Invalid session status transition from {} to {}", from, to)]
    InvalidStatusTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },
    /// Requested chapter range is empty or inverted
    #[display("Invalid chapter range {}..={}", start, end)]
    InvalidChapterRange {
        /// First chapter in the range
        start: u32,
        /// Last chapter in the range
        end: u32,
    },
    /// Session not found in the repository
    #[display("Session not found: {}", _0)]
    SessionNotFound(String),
    /// Chapter is not recorded on the session
    #[display("Chapter {} is not part of session", _0)]
    ChapterNotInSession(u32),
}

/// Validation error with source location.
///
/// Fatal to the single operation that raised it.
///
/// # Examples
///
/// ```
/// use folio_error::{ValidationError, ValidationErrorKind};
///
/// let err = ValidationError::new(ValidationErrorKind::NoBlueprintForChapter(4));
/// assert!(format!("{}", err).contains("chapter 4"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Validation Error: {} at line {} in {}", kind, line, file)]
pub struct ValidationError {
    /// The specific error condition
    pub kind: ValidationErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new ValidationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ValidationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
