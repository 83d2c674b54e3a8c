//! Errors from assembling engine values with generated builders.

/// A builder was finished before every required field was set.
///
/// # Examples
///
/// ```
/// use folio_error::BuilderError;
///
/// let err = BuilderError::new("ChapterGenerationContext", "`budget` must be initialized");
/// assert_eq!(err.type_name, "ChapterGenerationContext");
/// assert!(err.to_string().contains("budget"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Builder Error: cannot build {}: {} at line {} in {}", type_name, message, line, file)]
pub struct BuilderError {
    /// Type the builder was producing
    pub type_name: &'static str,
    /// What the builder reported
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl BuilderError {
    /// Record a failed build of `type_name`.
    #[track_caller]
    pub fn new(type_name: &'static str, message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            type_name,
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
