//! Error types for the Folio generation engine.
//!
//! # Error Hierarchy
//!
//! Every error follows the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - Constructors use `#[track_caller]` for automatic location capture
//!
//! Parse failures ([`JsonError`]) are normally recovered where they occur and
//! only logged. [`CancelledError`] is a distinct signal rather than a failure;
//! check [`FolioError::is_cancelled`] before logging an error.
//!
//! # Examples
//!
//! ```
//! use folio_error::{BackendError, FolioResult};
//!
//! fn call_backend() -> FolioResult<String> {
//!     Err(BackendError::new("Connection refused"))?
//! }
//!
//! assert!(call_backend().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod builder;
mod cancelled;
mod config;
mod error;
mod json;
mod pipeline;
mod validation;

pub use backend::BackendError;
pub use builder::BuilderError;
pub use cancelled::CancelledError;
pub use config::{ConfigError, ConfigErrorKind};
pub use error::{FolioError, FolioErrorKind, FolioResult};
pub use json::JsonError;
pub use pipeline::{PipelineError, PipelineErrorKind};
pub use validation::{ValidationError, ValidationErrorKind};
