//! Top-level error wrapper types.

use crate::{
    BackendError, BuilderError, CancelledError, ConfigError, JsonError, PipelineError,
    ValidationError,
};

/// Every error condition the engine can surface.
///
/// # Examples
///
/// ```
/// use folio_error::{BackendError, FolioError};
///
/// let err: FolioError = BackendError::new("Connection failed").into();
/// assert!(format!("{}", err).contains("Backend Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum FolioErrorKind {
    /// Missing or mismatched blueprint, chapter, or session reference
    #[from(ValidationError)]
    Validation(ValidationError),
    /// Generation backend call failed
    #[from(BackendError)]
    Backend(BackendError),
    /// Malformed backend response
    #[from(JsonError)]
    Json(JsonError),
    /// Chapter pipeline failure
    #[from(PipelineError)]
    Pipeline(PipelineError),
    /// Cooperative cancellation
    #[from(CancelledError)]
    Cancelled(CancelledError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
}

/// Folio error with kind discrimination.
///
/// # Examples
///
/// ```
/// use folio_error::{CancelledError, FolioError, FolioResult};
///
/// fn stopped() -> FolioResult<()> {
///     Err(CancelledError::new("session"))?
/// }
///
/// let err = stopped().unwrap_err();
/// assert!(err.is_cancelled());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Folio Error: {}", _0)]
pub struct FolioError(Box<FolioErrorKind>);

impl FolioError {
    /// Create a new error from a kind.
    pub fn new(kind: FolioErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &FolioErrorKind {
        &self.0
    }

    /// True when this error is a cancellation signal rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), FolioErrorKind::Cancelled(_))
    }
}

// Generic From implementation for any type that converts to FolioErrorKind
impl<T> From<T> for FolioError
where
    T: Into<FolioErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Folio operations.
pub type FolioResult<T> = std::result::Result<T, FolioError>;
