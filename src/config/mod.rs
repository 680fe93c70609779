//! Host preferences storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::loopback::LoopbackFactory;
use crate::session::Role;

/// Host preferences. Every field has a default so a partial file loads.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display name used when `--name` is not given
    pub display_name: Option<String>,
    /// Role used when `--role` is not given
    pub role: Role,
    /// Loopback widget behaviour
    pub loopback: LoopbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Delay before the loopback widget reports the conference joined
    pub join_delay_ms: u64,
    /// Remote participants announced after joining
    pub remote_participants: Vec<String>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            join_delay_ms: 800,
            remote_participants: vec!["consultant".to_string()],
        }
    }
}

impl LoopbackConfig {
    pub fn factory(&self) -> LoopbackFactory {
        LoopbackFactory::new(
            Duration::from_millis(self.join_delay_ms),
            self.remote_participants.clone(),
        )
    }
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "consult-call", "consult-call")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<PathBuf> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        fs::write(&path, self.to_toml()?).context("Failed to write config file")?;
        Ok(path)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// CLI value wins over the stored one.
    pub fn resolve_display_name(&self, cli: Option<String>) -> Option<String> {
        cli.or_else(|| self.display_name.clone())
            .filter(|n| !n.trim().is_empty())
    }

    pub fn resolve_role(&self, cli: Option<Role>) -> Role {
        cli.unwrap_or(self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::parse("display_name = \"Dr. Rivera\"\nrole = \"nutritionist\"\n")
            .unwrap();
        assert_eq!(config.display_name.as_deref(), Some("Dr. Rivera"));
        assert_eq!(config.role, Role::Nutritionist);
        assert_eq!(config.loopback.join_delay_ms, 800);
        assert_eq!(config.loopback.remote_participants, vec!["consultant"]);
    }

    #[test]
    fn test_loopback_section() {
        let config = Config::parse(
            "[loopback]\njoin_delay_ms = 50\nremote_participants = [\"a\", \"b\"]\n",
        )
        .unwrap();
        assert_eq!(config.role, Role::Patient);
        assert_eq!(config.loopback.join_delay_ms, 50);
        assert_eq!(config.loopback.remote_participants.len(), 2);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let err = Config::parse("role = 7").unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config {
            display_name: Some("Stored".into()),
            role: Role::Nutritionist,
            ..Default::default()
        };
        assert_eq!(
            config.resolve_display_name(Some("Cli".into())).as_deref(),
            Some("Cli")
        );
        assert_eq!(config.resolve_display_name(None).as_deref(), Some("Stored"));
        assert_eq!(config.resolve_role(Some(Role::Patient)), Role::Patient);
        assert_eq!(config.resolve_role(None), Role::Nutritionist);

        let empty = Config::default();
        assert_eq!(empty.resolve_display_name(Some("  ".into())), None);
    }
}
