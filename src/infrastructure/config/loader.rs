use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::errors::ConfigError;
use crate::domain::models::SupervisorConfig;

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. overseer.yaml in the working directory
    /// 3. Environment variables (OVERSEER_* prefix, highest priority)
    pub fn load() -> Result<SupervisorConfig> {
        let config: SupervisorConfig = Figment::new()
            .merge(Serialized::defaults(SupervisorConfig::default()))
            .merge(Yaml::file("overseer.yaml"))
            .merge(Env::prefixed("OVERSEER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<SupervisorConfig> {
        let config: SupervisorConfig = Figment::new()
            .merge(Serialized::defaults(SupervisorConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("OVERSEER_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate scalar settings after extraction.
    ///
    /// Graph validation (duplicates, unknown dependencies, cycles) happens
    /// in `SpecRegistry::load`; this only checks supervisor-wide fields.
    pub fn validate(config: &SupervisorConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
