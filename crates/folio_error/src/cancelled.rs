//! Cooperative cancellation signal.

/// Raised when a cancellation flag fires at a checkpoint.
///
/// Aborts the current scope without producing a partial result. This is not a
/// failure and should not be logged as one.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Cancelled: {} at line {} in {}", scope, line, file)]
pub struct CancelledError {
    /// The scope that observed the cancellation (e.g. "pipeline", "session")
    pub scope: String,
    /// Line number where the cancellation was observed
    pub line: u32,
    /// File where the cancellation was observed
    pub file: &'static str,
}

impl CancelledError {
    /// Create a new CancelledError for the given scope.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_error::CancelledError;
    ///
    /// let err = CancelledError::new("pipeline");
    /// assert_eq!(err.scope, "pipeline");
    /// ```
    #[track_caller]
    pub fn new(scope: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            scope: scope.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
