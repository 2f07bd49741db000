//! Game installation discovery and the on-disk active-state adapter.
//!
//! Installations are looked up in a fixed list of launcher locations. Inside
//! an installation the active account is split across two files:
//! - `drive_c/users/<login>/AppData/LocalLow/miHoYo/Genshin Impact/UidInfo.txt`
//!   holds the active id.
//! - `user.reg` holds the credential blob.

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::active::{ActiveSnapshot, ActiveState};
use crate::error::SwitchError;
use crate::fs_utils::{read_optional, write_atomic};

/// Launcher game directories, relative to the home directory
const INSTALL_LOCATIONS: &[&str] = &[
    // Anime Game Launcher
    ".local/share/anime-game-launcher/game",
    // Anime Game Launcher GTK
    ".local/share/anime-game-launcher-gtk/game",
    // Anime Game Launcher GTK (Flatpak)
    ".var/app/moe.launcher.an-anime-game-launcher-gtk/data/anime-game-launcher/game",
    // Anime Game Launcher (Flatpak)
    ".var/app/com.gitlab.KRypt0n_.an-anime-game-launcher/data/anime-game-launcher/game",
];

const REGISTRY_FILE: &str = "user.reg";
const UID_INFO_FILE: &str = "AppData/LocalLow/miHoYo/Genshin Impact/UidInfo.txt";

/// Candidate installation directories under `home`
pub fn candidate_locations(home: &Path) -> Vec<PathBuf> {
    INSTALL_LOCATIONS.iter().map(|l| home.join(l)).collect()
}

/// Candidate installation directories under the current user's home
pub fn default_candidates() -> Result<Vec<PathBuf>> {
    let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
    Ok(candidate_locations(base_dirs.home_dir()))
}

/// Return the candidates that exist, in candidate order
pub fn find_installations(candidates: &[PathBuf]) -> Vec<PathBuf> {
    candidates.iter().filter(|p| p.exists()).cloned().collect()
}

/// Pick the unique installation. Never guesses between several.
pub fn locate(candidates: &[PathBuf]) -> Result<PathBuf, SwitchError> {
    let mut found = find_installations(candidates);
    debug!(count = found.len(), "located game installations");
    match found.len() {
        0 => Err(SwitchError::NoInstallationFound),
        1 => Ok(found.remove(0)),
        _ => Err(SwitchError::AmbiguousInstallation(found)),
    }
}

/// Where to look for the game
#[derive(Debug, Clone)]
pub enum InstallLocation {
    /// `--install-dir`
    Explicit(PathBuf),
    /// The launcher locations, in order
    Search(Vec<PathBuf>),
}

/// How to find the game installation and which login owns its Wine prefix
#[derive(Debug, Clone)]
pub struct InstallSource {
    location: InstallLocation,
    /// Falls back to [`current_login`] when unset
    login: Option<String>,
}

impl InstallSource {
    pub fn new(explicit: Option<PathBuf>) -> Result<Self> {
        match explicit {
            Some(dir) => Ok(Self::explicit(dir)),
            None => Ok(Self::search(default_candidates()?)),
        }
    }

    pub fn explicit(dir: impl Into<PathBuf>) -> Self {
        Self {
            location: InstallLocation::Explicit(dir.into()),
            login: None,
        }
    }

    pub fn search(candidates: Vec<PathBuf>) -> Self {
        Self {
            location: InstallLocation::Search(candidates),
            login: None,
        }
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn locate(&self) -> Result<PathBuf, SwitchError> {
        match &self.location {
            InstallLocation::Explicit(dir) if dir.is_dir() => Ok(dir.clone()),
            InstallLocation::Explicit(_) => Err(SwitchError::NoInstallationFound),
            InstallLocation::Search(candidates) => locate(candidates),
        }
    }

    pub fn login(&self) -> Result<String> {
        match &self.login {
            Some(login) => Ok(login.clone()),
            None => current_login(),
        }
    }

    /// Open the installation at `root` for this source's login
    pub fn open_at(&self, root: PathBuf) -> Result<GameInstallation> {
        Ok(GameInstallation::new(root, self.login()?))
    }

    /// Locate the installation and open it
    pub fn open(&self) -> Result<GameInstallation> {
        self.open_at(self.locate()?)
    }
}

/// Login name used in the Wine prefix user directory
pub fn current_login() -> Result<String> {
    login_from(|key| std::env::var(key).ok())
}

/// `USER`, then `USERNAME`, from `lookup`
fn login_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    lookup("USER")
        .filter(|login| !login.is_empty())
        .or_else(|| lookup("USERNAME").filter(|login| !login.is_empty()))
        .context("Failed to determine login name (neither USER nor USERNAME is set)")
}

/// A located game installation, read and written through [`ActiveState`]
#[derive(Debug, Clone)]
pub struct GameInstallation {
    root: PathBuf,
    login: String,
}

impl GameInstallation {
    pub fn new(root: impl Into<PathBuf>, login: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            login: login.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uid_file(&self) -> PathBuf {
        self.root
            .join("drive_c/users")
            .join(&self.login)
            .join(UID_INFO_FILE)
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    fn read_id(&self) -> Result<Option<String>> {
        let path = self.uid_file();
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes)
            .with_context(|| format!("Account id file is not UTF-8: {}", path.display()))?;
        let id = text.trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }
}

impl ActiveState for GameInstallation {
    fn read(&self) -> Result<ActiveSnapshot> {
        Ok(ActiveSnapshot {
            id: self.read_id()?,
            blob: read_optional(&self.registry_file())?,
        })
    }

    fn write(&mut self, id: &str, blob: &[u8]) -> Result<()> {
        // Each file is replaced atomically; the pair is not.
        write_atomic(&self.uid_file(), format!("{id}\n").as_bytes())?;
        write_atomic(&self.registry_file(), blob)?;
        debug!(account = id, root = %self.root.display(), "wrote active account");
        Ok(())
    }
}
