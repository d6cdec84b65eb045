//! YAML configuration parsing.
//!
//! Parses and validates `errand.yaml`. Every section is optional; missing
//! values fall back to their defaults.

use std::path::Path;

use super::error::ConfigError;
use super::types::ErrandConfig;

/// Loader for YAML configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ErrandConfig, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        let config: ErrandConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<ErrandConfig, ConfigError> {
        let config: ErrandConfig = serde_yaml::from_str(yaml)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration.
    pub fn validate(config: &ErrandConfig) -> Result<(), ConfigError> {
        // A zero timeout would fail every task immediately
        if config.execution.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "execution.timeout_secs cannot be zero".into(),
            ));
        }

        if config.server.host.trim().is_empty() {
            return Err(ConfigError::MissingField("server.host".into()));
        }

        if let Some(program) = &config.agent.program
            && program.trim().is_empty()
        {
            return Err(ConfigError::InvalidConfig(
                "agent.program cannot be empty".into(),
            ));
        }

        Ok(())
    }
}
