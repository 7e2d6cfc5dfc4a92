//! Configuration loader
//!
//! Handles loading configuration from TOML files, environment variables,
//! and default values.

use crate::config::RuntimeConfig;
use crate::constants::*;
use crate::error_ext::ErrorContext;
use crate::logging::{log_config_loaded, parse_log_level};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use notifyr_domain::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader service
#[derive(Clone)]
pub struct ConfigLoader {
    /// Configuration file path
    config_path: Option<PathBuf>,

    /// Environment prefix
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources
    ///
    /// Sources are merged in this order (later sources override earlier):
    /// 1. `RuntimeConfig::default()`
    /// 2. TOML configuration file (if it exists)
    /// 3. Environment variables with prefix, `__` between nested keys
    ///    (e.g. `NOTIFYR_ROTATION__MAX_RETRY=5`)
    pub fn load(&self) -> Result<RuntimeConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(RuntimeConfig::default()));

        if let Some(config_path) = &self.config_path {
            if config_path.exists() {
                figment = figment.merge(Toml::file(config_path));
                log_config_loaded(config_path, true);
            } else {
                log_config_loaded(config_path, false);
            }
        } else if let Some(default_path) = Self::find_default_config_path() {
            figment = figment.merge(Toml::file(&default_path));
            log_config_loaded(&default_path, true);
        }

        figment = figment.merge(
            Env::prefixed(&format!("{}_", self.env_prefix)).split(CONFIG_ENV_SEPARATOR),
        );

        let config: RuntimeConfig = figment
            .extract()
            .config_context("Failed to extract configuration")?;

        validate_runtime_config(&config)?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, config: &RuntimeConfig, path: P) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(config).context("Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), toml_string).io_context("Failed to write config file")?;

        Ok(())
    }

    /// Get the current configuration file path
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    fn find_default_config_path() -> Option<PathBuf> {
        let current_dir = env::current_dir().ok()?;

        let candidates = vec![
            current_dir.join(DEFAULT_CONFIG_FILENAME),
            current_dir
                .join(DEFAULT_CONFIG_DIR)
                .join(DEFAULT_CONFIG_FILENAME),
            dirs::config_dir()
                .map(|d| d.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILENAME))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|d| {
                    d.join(format!(".{}", DEFAULT_CONFIG_DIR))
                        .join(DEFAULT_CONFIG_FILENAME)
                })
                .unwrap_or_default(),
        ];

        candidates.into_iter().find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate runtime configuration
pub fn validate_runtime_config(config: &RuntimeConfig) -> Result<()> {
    if config.mode.trim().is_empty() {
        return Err(Error::configuration("Mode cannot be empty"));
    }
    if config.events.capacity == 0 {
        return Err(Error::configuration("Event bus capacity cannot be 0"));
    }
    if config.blocking.max_threads == 0 {
        return Err(Error::configuration(
            "Blocking pool max_threads cannot be 0",
        ));
    }
    validate_rotation_config(config)?;
    parse_log_level(&config.logging.level)?;
    Ok(())
}

fn validate_rotation_config(config: &RuntimeConfig) -> Result<()> {
    let rotation = &config.rotation;
    if !(0.0..1.0).contains(&rotation.jitter_ratio) {
        return Err(Error::configuration(format!(
            "Rotation jitter_ratio must be in [0, 1), got {}",
            rotation.jitter_ratio
        )));
    }
    if rotation.buffer_min_secs > rotation.buffer_max_secs {
        return Err(Error::configuration(format!(
            "Rotation buffer range is inverted: {}..{}",
            rotation.buffer_min_secs, rotation.buffer_max_secs
        )));
    }
    Ok(())
}
