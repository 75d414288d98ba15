//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_GRID_URL: &str = "http://localhost:4000";

/// CLI configuration file (`~/.config/gridv/config.json`)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Grid bridge URL
    pub grid_url: Option<String>,
    /// Project scope for get/teardown commands
    pub project: Option<String>,
    /// Default farm for node queries and runs
    pub farm_id: Option<u32>,
    /// SSH key injected into scenario workloads
    pub ssh_key: Option<String>,
}

impl Config {
    /// Load configuration from the default location; a missing file is empty config
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to a file, creating parent directories. The CLI only
    /// reads its config; writing is for fixtures.
    #[cfg(test)]
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("gridv").join("config.json"))
    }

    /// Flag or env value first, then the file, then the built-in default
    pub fn grid_url(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.grid_url.clone())
            .unwrap_or_else(|| DEFAULT_GRID_URL.to_string())
    }

    pub fn project(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::to_string).or_else(|| self.project.clone())
    }

    pub fn farm_id(&self, flag: Option<u32>) -> u32 {
        flag.or(self.farm_id).unwrap_or(1)
    }

    pub fn ssh_key(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.ssh_key.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            grid_url: Some("http://bridge:4000".to_string()),
            project: Some("peertube/pt1".to_string()),
            farm_id: Some(3),
            ssh_key: None,
        };

        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_flag_overrides_file() {
        let config = Config {
            grid_url: Some("http://file:4000".to_string()),
            farm_id: Some(3),
            ..Config::default()
        };

        assert_eq!(config.grid_url(Some("http://flag:4000")), "http://flag:4000");
        assert_eq!(config.grid_url(None), "http://file:4000");
        assert_eq!(Config::default().grid_url(None), DEFAULT_GRID_URL);
        assert_eq!(config.farm_id(Some(9)), 9);
        assert_eq!(config.farm_id(None), 3);
        assert_eq!(Config::default().project(None), None);
    }
}
