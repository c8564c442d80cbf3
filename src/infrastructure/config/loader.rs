use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project configuration file, relative to the working directory.
pub const CONFIG_FILE: &str = "swr-coupler.yaml";
/// Optional local overrides, relative to the working directory.
pub const LOCAL_CONFIG_FILE: &str = "swr-coupler.local.yaml";
pub const ENV_PREFIX: &str = "SWR_";

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Output root cannot be empty")]
    EmptyOutputRoot,

    #[error("Model runner executable cannot be empty")]
    EmptyExecutable,

    #[error("Invalid runner timeout: 0 seconds. Leave it unset for no limit")]
    ZeroTimeout,

    #[error("Invalid max_iters: {0}. Must be at least 1")]
    InvalidMaxIters(u32),

    #[error("Invalid rel_tol: {0}. Must be finite and positive")]
    InvalidRelTol(f64),

    #[error("Invalid debug output pattern '{0}'")]
    InvalidDebugPattern(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. swr-coupler.yaml
    /// 3. swr-coupler.local.yaml (optional)
    /// 4. Environment variables (SWR_* prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment(Path::new(CONFIG_FILE), Path::new(LOCAL_CONFIG_FILE))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. Environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file {} does not exist", path.display());
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(base: &Path, local: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base))
            .merge(Yaml::file(local))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.output_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyOutputRoot);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if config.runner.executable.trim().is_empty() {
            return Err(ConfigError::EmptyExecutable);
        }
        if config.runner.timeout_seconds == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        if config.swr.max_iters == 0 {
            return Err(ConfigError::InvalidMaxIters(config.swr.max_iters));
        }
        if !config.swr.rel_tol.is_finite() || config.swr.rel_tol <= 0.0 {
            return Err(ConfigError::InvalidRelTol(config.swr.rel_tol));
        }

        if let Some(pattern) = config
            .output
            .debug_patterns
            .iter()
            .find(|pattern| pattern.trim().is_empty() || glob::Pattern::new(pattern).is_err())
        {
            return Err(ConfigError::InvalidDebugPattern(pattern.clone()));
        }

        Ok(())
    }
}
