//! Generation settings carried by a blueprint.

use serde::{Deserialize, Serialize};

/// Content rating constraint applied to every prompt.
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
pub enum ContentRating {
    /// Suitable for all readers
    General,
    /// Teen audience; mild violence and language
    #[default]
    Teen,
    /// Adult audience; strong themes allowed, no explicit content
    Mature,
}

impl ContentRating {
    /// Constraint sentences appended to the system prompt.
    pub fn constraints(&self) -> &'static [&'static str] {
        match self {
            ContentRating::General => &[
                "Keep all content suitable for readers of every age.",
                "No profanity, graphic violence, or sexual content.",
            ],
            ContentRating::Teen => &[
                "Keep content suitable for teenage readers.",
                "Violence may be depicted without graphic detail; avoid strong profanity.",
                "No sexual content.",
            ],
            ContentRating::Mature => &[
                "Mature themes, violence, and strong language are permitted where the story needs them.",
                "Never include explicit sexual content.",
            ],
        }
    }
}

/// Generation settings for one book.
///
/// Every threshold the engine applies is read from here; nothing else keeps
/// its own copy.
///
/// # Examples
///
/// ```
/// use folio_core::{GenerationConfig, GenerationConfigBuilder};
///
/// let config = GenerationConfigBuilder::default()
///     .context_window_size(32_000usize)
///     .max_revisions(1u32)
///     .build()
///     .unwrap();
///
/// assert_eq!(*config.context_window_size(), 32_000);
/// assert_eq!(*config.quality_threshold(), 70.0);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
#[serde(default)]
pub struct GenerationConfig {
    /// Size of the model's context window in tokens
    context_window_size: usize,
    /// Content rating constraint
    content_rating: ContentRating,
    /// Sampling temperature for prose generation
    temperature: f32,
    /// Sampling temperature for scoring and extraction calls
    evaluation_temperature: f32,
    /// Overall score below which the revision loop runs
    quality_threshold: f64,
    /// Overall score at or above which a chapter is approved
    approval_threshold: f64,
    /// Upper bound on revision passes per chapter
    max_revisions: u32,
    /// Characters included when a chapter names none
    max_default_characters: usize,
    /// Locations included when a chapter names none
    max_default_locations: usize,
    /// Run the continuity check step
    enable_continuity_check: bool,
    /// Run the quality evaluation step
    enable_quality_evaluation: bool,
    /// Run the revision step
    enable_auto_revision: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            context_window_size: 128_000,
            content_rating: ContentRating::default(),
            temperature: 0.8,
            evaluation_temperature: 0.3,
            quality_threshold: 70.0,
            approval_threshold: 60.0,
            max_revisions: 2,
            max_default_characters: 5,
            max_default_locations: 3,
            enable_continuity_check: true,
            enable_quality_evaluation: true,
            enable_auto_revision: true,
        }
    }
}
