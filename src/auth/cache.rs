//! Local cache of previously discovered strategies.
//!
//! Lets the strategy list render while offline. One JSON blob per strategy
//! under a fixed filename in the platform data directory; overwritten
//! wholesale after each successful discovery.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use super::strategy::{ServerCapabilities, StrategyDescriptor};

/// File-backed strategy cache.
#[derive(Debug, Clone)]
pub struct StrategyCache {
    path: PathBuf,
}

impl StrategyCache {
    /// Default cache path in the platform data directory.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir =
            dirs::data_local_dir().context("Could not determine local data directory")?;
        Ok(data_dir.join("fieldgate").join("strategies.json"))
    }

    /// Cache at the default path.
    pub fn open() -> Result<Self> {
        Ok(Self::open_at(Self::default_path()?))
    }

    /// Cache at a specific path.
    pub fn open_at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Replace the cache with the given capabilities.
    pub fn store(&self, capabilities: &ServerCapabilities) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let entries: Vec<Value> = capabilities
            .iter()
            .map(|(id, config)| {
                serde_json::json!({ "identifier": id, "strategy": config })
            })
            .collect();

        let contents = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write strategy cache: {}", self.path.display()))
    }

    /// Load the cached strategies.
    ///
    /// A missing or corrupt cache yields an empty list; entries without an
    /// identifier are skipped.
    pub fn load(&self) -> Vec<StrategyDescriptor> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };

        let entries: Vec<Value> = match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "strategy cache unreadable");
                return Vec::new();
            }
        };

        entries
            .iter()
            .filter_map(StrategyDescriptor::from_value)
            .collect()
    }
}
