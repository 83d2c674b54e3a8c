//! Layered engine configuration.
//!
//! Sources, later overriding earlier:
//! - Bundled defaults (include_str! from folio.toml)
//! - `~/.config/folio/folio.toml`
//! - `./folio.toml`

use config::{Config, File, FileFormat};
use folio_core::GenerationConfig;
use folio_error::{ConfigError, FolioError, FolioResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../../../folio.toml");

/// Engine configuration.
///
/// # Example
///
/// ```toml
/// [generation]
/// context_window_size = 200000
/// quality_threshold = 75.0
/// max_revisions = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct FolioConfig {
    /// Defaults for new blueprints' generation settings
    generation: GenerationConfig,
}

impl FolioConfig {
    /// Load a single configuration file.
    ///
    /// Keys the file leaves out take their built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the file is missing or malformed.
    #[instrument(skip_all)]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> FolioResult<Self> {
        debug!(path = %path.as_ref().display(), "Loading configuration from file");

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                FolioError::from(ConfigError::unreadable(
                    path.as_ref().display().to_string(),
                    e.to_string(),
                ))
            })?
            .try_deserialize()
            .map_err(|e| FolioError::from(ConfigError::invalid(e.to_string())))
    }

    /// Load configuration with precedence current dir > home dir > bundled defaults.
    ///
    /// User files are optional and skipped when absent.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use folio_generation::FolioConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = FolioConfig::load()?;
    /// println!("{}", config.generation().max_revisions());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument]
    pub fn load() -> FolioResult<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/folio/folio.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("folio").required(false));

        builder
            .build()
            .map_err(|e| FolioError::from(ConfigError::unreadable("layered sources", e.to_string())))?
            .try_deserialize()
            .map_err(|e| FolioError::from(ConfigError::invalid(e.to_string())))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed TOML.
    pub fn from_toml(source: &str) -> FolioResult<Self> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| FolioError::from(ConfigError::invalid(e.to_string())))
    }
}
