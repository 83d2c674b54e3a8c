//! Options passed to a generation backend call.

use serde::{Deserialize, Serialize};

/// Requested shape of the backend's response.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum ResponseFormat {
    /// Free-form text
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// Sampling options for one backend call.
///
/// # Examples
///
/// ```
/// use folio_core::{GenerationOptions, ResponseFormat};
///
/// let options = GenerationOptions::builder()
///     .temperature(0.3)
///     .max_tokens(1_000u32)
///     .response_format(ResponseFormat::Json)
///     .build()
///     .unwrap();
///
/// assert_eq!(options.max_tokens, 1_000);
/// assert_eq!(options.top_p, None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(default)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Nucleus sampling
    #[builder(setter(strip_option))]
    pub top_p: Option<f32>,
    /// Requested response format
    #[builder(setter(strip_option))]
    pub response_format: Option<ResponseFormat>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2_000,
            top_p: None,
            response_format: None,
        }
    }
}

impl GenerationOptions {
    /// Creates a new options builder.
    pub fn builder() -> GenerationOptionsBuilder {
        GenerationOptionsBuilder::default()
    }

    /// Free-text options with the given temperature and token limit.
    pub fn text(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            top_p: None,
            response_format: None,
        }
    }

    /// JSON-mode options with the given temperature and token limit.
    pub fn json(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            top_p: None,
            response_format: Some(ResponseFormat::Json),
        }
    }
}
