use std::path::Path;

use tracing::debug;

use crate::config::MigrateConfig;
use crate::error::ConfigError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "SUNBEAM_MIGRATE_CONFIG";

impl MigrateConfig {
    /// Load the configuration from the specified YAML file.
    ///
    /// Missing keys keep their defaults; unknown keys are an error so typos
    /// don't silently fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: MigrateConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
                path: path.display().to_string(),
                source: e,
            })?;
        debug!("Loaded config: {}", path.display());
        Ok(config)
    }

    /// Load from the file named by `SUNBEAM_MIGRATE_CONFIG`, falling back to
    /// pure defaults when the variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}

/// Resolve the configuration: an explicit path wins over the environment.
pub fn load_config(explicit: Option<&Path>) -> Result<MigrateConfig, ConfigError> {
    match explicit {
        Some(path) => MigrateConfig::load(path),
        None => MigrateConfig::from_env(),
    }
}
