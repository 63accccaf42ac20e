//! Config module - Manages ssh-export configuration (config.toml).
//!
//! Configuration file contains:
//! - Target SSH directory
//! - Vault CLI settings (binary, category filter, title fallback)
//! - Key derivation utility settings

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Vault CLI configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Vault CLI binary (name on PATH or absolute path)
    #[serde(default = "default_vault_binary")]
    pub binary: PathBuf,
    /// Item category used for the first discovery pass
    #[serde(default = "default_category")]
    pub category: String,
    /// Case-insensitive title substring used when the category pass is empty
    #[serde(default = "default_title_filter")]
    pub title_filter: String,
}

fn default_vault_binary() -> PathBuf {
    PathBuf::from("op")
}

fn default_category() -> String {
    "SSH Key".to_string()
}

fn default_title_filter() -> String {
    "ssh".to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            binary: default_vault_binary(),
            category: default_category(),
            title_filter: default_title_filter(),
        }
    }
}

/// Public key derivation utility configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KeygenConfig {
    /// ssh-keygen binary
    #[serde(default = "default_keygen_binary")]
    pub binary: PathBuf,
}

fn default_keygen_binary() -> PathBuf {
    PathBuf::from("ssh-keygen")
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            binary: default_keygen_binary(),
        }
    }
}

/// Main ssh-export configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory keys are exported into
    #[serde(default = "default_ssh_dir")]
    pub ssh_dir: PathBuf,

    /// Vault CLI configuration
    #[serde(default)]
    pub vault: VaultConfig,

    /// Key derivation configuration
    #[serde(default)]
    pub keygen: KeygenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssh_dir: default_ssh_dir(),
            vault: VaultConfig::default(),
            keygen: KeygenConfig::default(),
        }
    }
}

/// Get default SSH directory (~/.ssh).
pub fn default_ssh_dir() -> PathBuf {
    dirs::home_dir()
        .map(|d| d.join(".ssh"))
        .unwrap_or_else(|| PathBuf::from(".ssh"))
}

/// Get default config directory (~/.config/ssh-export/).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("ssh-export"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get default config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

impl Config {
    /// Create config with a specific SSH directory.
    pub fn with_ssh_dir(ssh_dir: PathBuf) -> Self {
        Self {
            ssh_dir,
            ..Self::default()
        }
    }

    /// Load config from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from default path, falling back to defaults.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.vault.binary, PathBuf::from("op"));
        assert_eq!(config.vault.category, "SSH Key");
        assert_eq!(config.vault.title_filter, "ssh");
        assert_eq!(config.keygen.binary, PathBuf::from("ssh-keygen"));
        assert!(config.ssh_dir.ends_with(".ssh"));
    }

    #[test]
    fn test_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");
        let ssh_dir = temp_dir.path().join("ssh");
        std::fs::write(
            &config_path,
            format!(
                "ssh_dir = {:?}\n\n[vault]\ncategory = \"Secure Note\"\n",
                ssh_dir.display().to_string()
            ),
        )?;

        let loaded = Config::load(&config_path)?;
        assert_eq!(loaded.ssh_dir, ssh_dir);
        assert_eq!(loaded.vault.category, "Secure Note");
        assert_eq!(loaded.vault.title_filter, "ssh");

        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[vault]\nbinary = \"/opt/op/op\"\n")?;

        let loaded = Config::load(&config_path)?;
        assert_eq!(loaded.vault.binary, PathBuf::from("/opt/op/op"));
        assert_eq!(loaded.vault.category, "SSH Key");
        assert_eq!(loaded.keygen.binary, PathBuf::from("ssh-keygen"));

        Ok(())
    }
}
