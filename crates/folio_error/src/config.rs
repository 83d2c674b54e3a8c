//! Configuration loading errors.

/// Where configuration loading went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A configuration source could not be read
    #[display("Cannot read {}: {}", source_name, message)]
    Unreadable {
        /// File path or layer name
        source_name: String,
        /// Reason reported by the loader
        message: String,
    },
    /// Sources were read but do not describe a valid configuration
    #[display("Invalid configuration: {}", _0)]
    Invalid(String),
}

/// Configuration error with source location.
///
/// # Examples
///
/// ```
/// use folio_error::{ConfigError, ConfigErrorKind};
///
/// let err = ConfigError::invalid("max_revisions: expected an integer");
/// assert!(matches!(err.kind, ConfigErrorKind::Invalid(_)));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    /// The specific error condition
    pub kind: ConfigErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// `source_name` could not be read.
    #[track_caller]
    pub fn unreadable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Unreadable {
            source_name: source_name.into(),
            message: message.into(),
        })
    }

    /// The merged sources failed to deserialize.
    #[track_caller]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Invalid(message.into()))
    }
}
