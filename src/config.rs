use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration for the field-data server connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the field-data server, e.g. `https://mage.example.org`.
    pub server_url: String,
    /// Per-candidate timeout for capability discovery requests, in seconds.
    pub discovery_timeout_secs: u64,
    /// Deadline for one module login/completion round-trip, in seconds.
    pub module_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            discovery_timeout_secs: 15,
            module_timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    /// Returns the default config file path: `{config_dir}/fieldgate/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fieldgate").join("config.toml"))
    }

    /// Load configuration from the default path, falling back to defaults.
    pub fn load() -> Self {
        Self::default_path()
            .and_then(|path| Self::load_from_path(&path).ok())
            .unwrap_or_default()
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn module_timeout(&self) -> Duration {
        Duration::from_secs(self.module_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.server_url.is_empty());
        assert_eq!(config.discovery_timeout(), Duration::from_secs(15));
        assert_eq!(config.module_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ClientConfig::default();
        config.server_url = "https://mage.example.org".to_string();
        config.module_timeout_secs = 30;
        config.save_to_path(&path).unwrap();

        let loaded = ClientConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.server_url, "https://mage.example.org");
        assert_eq!(loaded.module_timeout_secs, 30);
        assert_eq!(loaded.discovery_timeout_secs, 15);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_url = \"https://s.test\"\n").unwrap();

        let loaded = ClientConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.server_url, "https://s.test");
        assert_eq!(loaded.discovery_timeout_secs, 15);
    }
}
