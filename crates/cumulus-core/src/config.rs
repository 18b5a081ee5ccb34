//! Configuration module

use crate::naming::ArchiveFormat;
use crate::{Error, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// On-disk configuration: external tool locations and defaults.
/// CLI flags always win over file values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External tool binaries
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Default run settings
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Names (or full paths) of the external tool binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub rsync: String,
    pub seven_zip: String,
    pub zip: String,
    pub rclone: String,
    pub mysqldump: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Default remote (`<rclone remote>:<folder>`) used when `-r` gives none
    pub remote: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            rsync: "rsync".to_string(),
            seven_zip: "7z".to_string(),
            zip: "zip".to_string(),
            rclone: "rclone".to_string(),
            mysqldump: "mysqldump".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| Error::Config("Unable to determine config directory".to_string()))?;

        let cumulus_dir = config_dir.join("cumulus");
        if !cumulus_dir.exists() {
            fs::create_dir_all(&cumulus_dir)?;
        }

        Ok(cumulus_dir.join("config.toml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(&path, contents)?;
        Ok(())
    }

    /// Load configuration or use defaults if loading fails
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

/// Immutable per-run configuration, built once from parsed CLI input.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Source trees; all become entries of the same artifact
    pub sources: Vec<PathBuf>,
    /// Destination root holding the backup chain
    pub destination: PathBuf,
    /// Destination was a generated temporary folder (`-d` omitted);
    /// local cleanup removes it wholesale
    pub ephemeral: bool,
    /// `<rclone remote>:<folder>` to upload to
    pub remote: Option<String>,
    /// Differential backup against the latest chain
    pub incremental: bool,
    /// Archive encryption password
    pub password: Option<String>,
    /// Archive container format
    pub format: ArchiveFormat,
    /// Whether to archive at all (`--nocompress` disables)
    pub compress: bool,
    /// Dump all MySQL databases into the artifact before archiving
    pub mysql: bool,
    /// Dry run: report every action, perform none
    pub dry_run: bool,
    pub clean_local_after: Option<i64>,
    pub clean_all: bool,
    pub clean_remote_after: Option<i64>,
    pub tools: ToolsConfig,
}

impl RunConfig {
    /// Whether any local retention policy is active.
    pub fn cleans_local(&self) -> bool {
        self.clean_all || self.clean_local_after.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tools() {
        let config = Config::default();
        assert_eq!(config.tools.rsync, "rsync");
        assert_eq!(config.tools.seven_zip, "7z");
        assert_eq!(config.tools.rclone, "rclone");
        assert!(config.defaults.remote.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.defaults.remote = Some("gdrive:backup".to_string());
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.tools.rsync, deserialized.tools.rsync);
        assert_eq!(deserialized.defaults.remote.as_deref(), Some("gdrive:backup"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[defaults]\nremote = \"s3:vault\"\n").unwrap();
        assert_eq!(config.tools.zip, "zip");
        assert_eq!(config.defaults.remote.as_deref(), Some("s3:vault"));
    }
}
