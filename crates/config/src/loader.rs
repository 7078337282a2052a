//! Locating and reading pool configuration files

use cairn_core::{Error, Result, SerializationOp, CAIRN_CONFIG_VAR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::PoolConfig;

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Built-in defaults, no file was found
    #[default]
    Default,
    /// File in the user config directory
    ConfigFile(PathBuf),
    /// File named by an environment variable
    EnvironmentVariable(String),
    /// File given on the command line
    CommandLine(PathBuf),
}

/// Resolves the pool configuration with precedence handling
///
/// An explicit path wins over `CAIRN_CONFIG`, which wins over
/// `<config dir>/cairn/config.json`. Without any of them the default, empty
/// configuration is returned.
#[derive(Debug, Default)]
pub struct PoolConfigLoader {
    path: Option<PathBuf>,
}

impl PoolConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit configuration file
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Load and validate the configuration
    pub fn load(self) -> Result<PoolConfig> {
        let (path, source) = if let Some(path) = self.path {
            (path.clone(), ConfigSource::CommandLine(path))
        } else if let Ok(value) = std::env::var(CAIRN_CONFIG_VAR) {
            (
                PathBuf::from(value),
                ConfigSource::EnvironmentVariable(CAIRN_CONFIG_VAR.to_string()),
            )
        } else {
            match default_config_path() {
                Some(path) if path.exists() => (path.clone(), ConfigSource::ConfigFile(path)),
                _ => {
                    debug!("No pool configuration found, using defaults");
                    return Ok(PoolConfig::default());
                }
            }
        };

        let mut config = load_file(&path)?;
        config.source = source;
        config.validate()?;
        debug!(
            path = %path.display(),
            locations = config.locations.len(),
            "Loaded pool configuration"
        );
        Ok(config)
    }
}

/// Parse a configuration file without validating it
pub fn load_file(path: &Path) -> Result<PoolConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(path.display().to_string(), "read config file", e))?;

    serde_json::from_str(&content).map_err(|e| {
        Error::serialization(path.display().to_string(), SerializationOp::Deserialize, e)
    })
}

/// `<config dir>/cairn/config.json`, honouring `XDG_CONFIG_HOME`
pub fn default_config_path() -> Option<PathBuf> {
    let config_dir = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config_home) if !xdg_config_home.is_empty() => PathBuf::from(xdg_config_home),
        _ => dirs::config_dir()?,
    };
    Some(config_dir.join("cairn").join("config.json"))
}
