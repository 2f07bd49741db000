use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Record of the last successful switch, stored in `<config-root>/state.json`
///
/// Advisory only: it names the last known good account to switch back to
/// if a switch was interrupted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct State {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub switched_at: Option<DateTime<Utc>>,
}

impl State {
    /// Read state from file, returning default if file doesn't exist
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))
    }

    /// Record a completed switch to `account` under an exclusive lock
    pub fn record_switch(path: &Path, account: &str) -> Result<()> {
        let mut locked = LockedState::lock(path)?;
        locked.update(|s| s.last_account = Some(account.to_string()))
    }
}

/// A locked state file handle
pub struct LockedState {
    file: File,
    state: State,
    path: PathBuf,
}

impl LockedState {
    /// Open and lock the state file for exclusive access
    pub fn lock(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open state file: {}", path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to lock state file: {}", path.display()))?;

        // A corrupt state file is replaced rather than blocking the switch
        let state = Self::read_from_file(&file, path).unwrap_or_default();

        Ok(Self {
            file,
            state,
            path: path.to_path_buf(),
        })
    }

    fn read_from_file(mut file: &File, path: &Path) -> Result<State> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(State::default());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Update and save the state, stamping `switched_at`
    pub fn update<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut State),
    {
        f(&mut self.state);
        self.state.switched_at = Some(Utc::now());
        self.save()
    }

    fn save(&mut self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.state).context("Failed to serialize state")?;

        self.file
            .set_len(0)
            .with_context(|| format!("Failed to truncate state file: {}", self.path.display()))?;
        self.file
            .seek(SeekFrom::Start(0))
            .with_context(|| format!("Failed to seek state file: {}", self.path.display()))?;
        self.file
            .write_all(content.as_bytes())
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;
        self.file
            .sync_all()
            .with_context(|| format!("Failed to sync state file: {}", self.path.display()))?;

        Ok(())
    }
}

impl Drop for LockedState {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_state_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let state = State::read(&temp_dir.path().join("state.json")).unwrap();
        assert!(state.last_account.is_none());
        assert!(state.switched_at.is_none());
    }

    #[test]
    fn test_record_switch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        State::record_switch(&path, "100").unwrap();
        State::record_switch(&path, "200").unwrap();

        let state = State::read(&path).unwrap();
        assert_eq!(state.last_account.as_deref(), Some("200"));
        assert!(state.switched_at.is_some());
    }

    #[test]
    fn test_locked_state_replaces_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, "{ broken").unwrap();
        assert!(State::read(&path).is_err());

        {
            let locked = LockedState::lock(&path).unwrap();
            assert!(locked.state().last_account.is_none());
        }
        State::record_switch(&path, "100").unwrap();
        assert_eq!(State::read(&path).unwrap().last_account.as_deref(), Some("100"));
    }
}
