//! Configuration loader for moto-repo
//!
//! `ConfigLoader` loads settings from multiple sources with proper precedence.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Environment variable for configuration directory
const CONFIG_DIR_ENV: &str = "MOTO_CONFIG_DIR";

/// Environment variable for specific configuration file
const CONFIG_FILE_ENV: &str = "MOTO_CONFIG_FILE";

const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "MOTO";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

/// Configuration loader that handles layered configuration loading
///
/// Sources in order of priority:
/// 1. `default.toml` - Base default configuration (required)
/// 2. `{environment}.toml` - Environment-specific configuration (optional)
/// 3. `local.toml` - Local development overrides (optional)
/// 4. `MOTO_*` environment variables (highest priority)
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    /// Specific configuration file path (if set, skips layered loading)
    config_file: Option<PathBuf>,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Create a new configuration loader from `MOTO_CONFIG_DIR`,
    /// `MOTO_CONFIG_FILE` and `MOTO_APP_ENV`.
    ///
    /// # Errors
    ///
    /// Returns an error if both `MOTO_CONFIG_DIR` and `MOTO_CONFIG_FILE` are set.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));

        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_file.is_some() && std::env::var(CONFIG_DIR_ENV).is_ok() {
            return Err(ConfigError::mutual_exclusivity(
                "MOTO_CONFIG_DIR and MOTO_CONFIG_FILE cannot both be set. \
                 Use MOTO_CONFIG_DIR for layered configuration or \
                 MOTO_CONFIG_FILE for a single configuration file.",
            ));
        }

        Ok(Self {
            config_dir,
            config_file,
            environment: AppEnvironment::from_env(),
        })
    }

    /// Loader bound to a single file, ignoring the directory layout.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: Some(path.into()),
            environment: AppEnvironment::from_env(),
        }
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    /// Load and validate configuration from all sources
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `default.toml` is not found (when using layered loading)
    /// - Configuration parsing fails
    /// - Configuration validation fails
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let config = self.build_config()?;
        let settings: Settings = config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e))
        })?;

        settings.validate()?;

        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = Config::builder();

        let builder = if let Some(ref config_file) = self.config_file {
            self.add_file_source(builder, config_file, true)?
        } else {
            self.build_layered_config(builder)?
        };

        // MOTO_DATABASE__URL -> database.url
        let builder = Self::add_env_source(builder);

        builder.build().map_err(ConfigError::from)
    }

    fn build_layered_config(&self, builder: Builder) -> Result<Builder, ConfigError> {
        let default_path = self.config_dir.join("default.toml");
        let builder = self.add_file_source(builder, &default_path, true)?;

        let env_path = self.config_dir.join(self.environment.overlay_file());
        let builder = self.add_file_source(builder, &env_path, false)?;

        let local_path = self.config_dir.join("local.toml");
        self.add_file_source(builder, &local_path, false)
    }

    fn add_file_source(
        &self,
        builder: Builder,
        path: &Path,
        required: bool,
    ) -> Result<Builder, ConfigError> {
        if required && !path.exists() {
            return Err(ConfigError::file_not_found(format!(
                "Required configuration file not found: {}",
                path.display()
            )));
        }

        Ok(builder.add_source(
            File::new(path.to_str().unwrap_or_default(), FileFormat::Toml).required(required),
        ))
    }

    /// `MOTO_REPOSITORY__LOADING=eager` -> `repository.loading`
    fn add_env_source(builder: Builder) -> Builder {
        builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .ignore_empty(true)
                .try_parsing(true),
        )
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: None,
            environment: AppEnvironment::default(),
        })
    }
}
