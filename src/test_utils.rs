//! Test utilities shared across test modules

use anyhow::Result;
use tempfile::TempDir;

use crate::active::{ActiveSnapshot, ActiveState};
use crate::paths::Paths;

/// Create a Paths struct rooted in a temporary directory
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::with_root(&temp_dir.path().join("genshin-account-switcher"))
}

/// In-memory stand-in for the game installation
#[derive(Debug, Default)]
pub struct MemoryActiveState {
    snapshot: ActiveSnapshot,
    writes: usize,
}

impl MemoryActiveState {
    pub fn new(id: Option<&str>, blob: Option<&[u8]>) -> Self {
        Self {
            snapshot: ActiveSnapshot::new(id, blob),
            writes: 0,
        }
    }

    /// Number of `write` calls so far
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ActiveState for MemoryActiveState {
    fn read(&self) -> Result<ActiveSnapshot> {
        Ok(self.snapshot.clone())
    }

    fn write(&mut self, id: &str, blob: &[u8]) -> Result<()> {
        self.snapshot = ActiveSnapshot::new(Some(id), Some(blob));
        self.writes += 1;
        Ok(())
    }
}
