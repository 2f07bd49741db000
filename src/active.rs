use anyhow::Result;

/// The account currently installed into the game, as observed at one moment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSnapshot {
    /// Active account id; `None` when the game has no identifiable session
    pub id: Option<String>,
    /// Active credential blob; `None` when the credential file is missing
    pub blob: Option<Vec<u8>>,
}

impl ActiveSnapshot {
    pub fn new(id: Option<&str>, blob: Option<&[u8]>) -> Self {
        Self {
            id: id.map(str::to_string),
            blob: blob.map(<[u8]>::to_vec),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn blob(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.id() == Some(id)
    }
}

/// Access to the mutable `(active_id, active_blob)` pair owned by the game
///
/// Every write fully replaces the previous pair.
pub trait ActiveState {
    fn read(&self) -> Result<ActiveSnapshot>;

    /// Install `id` and `blob` as the active account, id first
    fn write(&mut self, id: &str, blob: &[u8]) -> Result<()>;
}
