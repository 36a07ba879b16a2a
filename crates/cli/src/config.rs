// CLI configuration.
//
// Resolution order: `~/.gaia/config.toml`, then environment, then flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Path to the global config file: `~/.gaia/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gaia").join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliConfig {
    pub server_url: String,
    pub api_secret: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self { server_url: DEFAULT_SERVER_URL.to_string(), api_secret: None }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl CliConfig {
    /// Load the global file and apply environment overrides. A missing or
    /// unparsable file falls back to defaults.
    pub fn load() -> Self {
        let file = global_config_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default();
        file.with_env_fn(|key| std::env::var(key).ok())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn with_env_fn<F>(self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        self.with_overrides(non_empty("GAIA_SERVER_URL"), non_empty("GAIA_API_SECRET"))
    }

    pub fn with_overrides(
        mut self,
        server_url: Option<String>,
        api_secret: Option<String>,
    ) -> Self {
        if let Some(server_url) = server_url {
            self.server_url = server_url;
        }
        if api_secret.is_some() {
            self.api_secret = api_secret;
        }
        self
    }
}
