use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Application name used for the platform config directory
pub const APP_NAME: &str = "genshin-account-switcher";

/// All computed paths used by gaswitch
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~/.config/genshin-account-switcher
    pub config_dir: PathBuf,
    /// ~/.config/genshin-account-switcher/accounts
    pub accounts_dir: PathBuf,
    /// ~/.config/genshin-account-switcher/state.json
    pub state_file: PathBuf,
}

impl Paths {
    /// Resolve paths under the platform config directory
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", APP_NAME)
            .context("Failed to determine the user config directory")?;
        Ok(Self::with_root(dirs.config_dir()))
    }

    /// Resolve paths under an explicit config root (from `--config-dir`)
    pub fn with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            accounts_dir: root.join("accounts"),
            state_file: root.join("state.json"),
        }
    }

    /// Get the path to a specific account directory
    pub fn account_dir(&self, id: &str) -> PathBuf {
        self.accounts_dir.join(id)
    }

    /// Get the path to a specific account's config.json
    pub fn account_config(&self, id: &str) -> PathBuf {
        self.account_dir(id).join("config.json")
    }

    /// Get the path to a specific account's stored user.reg
    pub fn account_blob(&self, id: &str) -> PathBuf {
        self.account_dir(id).join("user.reg")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.accounts_dir).with_context(|| {
            format!(
                "Failed to create accounts directory: {}",
                self.accounts_dir.display()
            )
        })
    }
}
