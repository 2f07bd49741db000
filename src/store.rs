//! Account store.
//!
//! Every known account owns one directory under `<config-root>/accounts/<id>/`:
//! - `user.reg` holds the saved credential blob, copied verbatim.
//! - `config.json` holds the display name alias as `{"uid": .., "name": ..}`.
//!
//! Both files are optional. The directory itself is the registration: an
//! account exists exactly when its directory exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use tracing::debug;

use crate::error::SwitchError;
use crate::fs_utils::{read_optional, write_atomic};
use crate::paths::Paths;

/// Contents of an account's `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub uid: String,
    pub name: String,
}

impl AccountConfig {
    /// Serialize with 4-space indentation, matching files written by earlier releases
    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)
            .context("Failed to serialize account config")?;
        Ok(buf)
    }
}

/// A stored account as read back from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: String,
    /// Display alias; `None` means no alias was set
    pub name: Option<String>,
    /// Saved credential blob; may be absent even though the account exists
    pub blob: Option<Vec<u8>>,
}

impl AccountRecord {
    pub fn has_blob(&self) -> bool {
        self.blob.is_some()
    }
}

/// Fields to write in [`AccountStore::put`]. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountUpdate<'a> {
    pub blob: Option<&'a [u8]>,
    pub name: Option<&'a str>,
}

impl<'a> AccountUpdate<'a> {
    pub fn blob(blob: &'a [u8]) -> Self {
        Self {
            blob: Some(blob),
            name: None,
        }
    }

    pub fn name(name: &'a str) -> Self {
        Self {
            blob: None,
            name: Some(name),
        }
    }

    pub fn with_name(mut self, name: Option<&'a str>) -> Self {
        self.name = name;
        self
    }
}

/// Validate an account id before it becomes a path segment
pub fn validate_account_id(id: &str) -> Result<(), SwitchError> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.chars().any(|c| c == '/' || c == '\\' || c == '\0');

    if invalid {
        return Err(SwitchError::InvalidAccountId(id.to_string()));
    }
    Ok(())
}

/// Filesystem-backed mapping from account id to [`AccountRecord`]
#[derive(Debug, Clone)]
pub struct AccountStore {
    paths: Paths,
}

impl AccountStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Check if an account is registered, whether or not a blob is stored
    pub fn exists(&self, id: &str) -> bool {
        validate_account_id(id).is_ok() && self.paths.account_dir(id).is_dir()
    }

    /// Read an account. A missing or malformed id yields `None`, not an error.
    pub fn get(&self, id: &str) -> Result<Option<AccountRecord>> {
        if !self.exists(id) {
            return Ok(None);
        }

        let name = self.read_config(id)?.map(|config| config.name);
        let blob = read_optional(&self.paths.account_blob(id))?;

        Ok(Some(AccountRecord {
            id: id.to_string(),
            name,
            blob,
        }))
    }

    /// Read only the credential blob of an account, ignoring its config.json
    pub fn blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        if !self.exists(id) {
            return Ok(None);
        }
        read_optional(&self.paths.account_blob(id))
    }

    /// Read only the display name of an account
    pub fn name(&self, id: &str) -> Result<Option<String>> {
        if !self.exists(id) {
            return Ok(None);
        }
        Ok(self.read_config(id)?.map(|config| config.name))
    }

    /// Read and parse an account's config.json, if present
    pub fn read_config(&self, id: &str) -> Result<Option<AccountConfig>> {
        let path = self.paths.account_config(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(config))
    }

    /// Create the account directory if missing, then write the provided fields
    pub fn put(&self, id: &str, update: AccountUpdate<'_>) -> Result<()> {
        validate_account_id(id)?;

        let dir = self.paths.account_dir(id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create account directory: {}", dir.display()))?;

        if let Some(blob) = update.blob {
            write_atomic(&self.paths.account_blob(id), blob)?;
            debug!(account = id, bytes = blob.len(), "stored credential blob");
        }

        if let Some(name) = update.name {
            let config = AccountConfig {
                uid: id.to_string(),
                name: name.to_string(),
            };
            write_atomic(&self.paths.account_config(id), &config.to_pretty_json()?)?;
            debug!(account = id, name, "stored account name");
        }

        Ok(())
    }

    /// List registered account ids in natural order ("999" before "1000")
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.paths.accounts_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Failed to read accounts directory: {}",
                        self.paths.accounts_dir.display()
                    )
                });
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            if !entry.path().is_dir() {
                continue;
            }
            #[allow(clippy::collapsible_if)]
            if let Some(id) = entry.file_name().to_str() {
                if validate_account_id(id).is_ok() {
                    ids.push(id.to_string());
                }
            }
        }

        ids.sort_by(|a, b| lexical_sort::natural_lexical_cmp(a, b));
        Ok(ids)
    }

    /// Read every registered account, in [`list_ids`](Self::list_ids) order
    pub fn list_accounts(&self) -> Result<Vec<AccountRecord>> {
        let mut accounts = Vec::new();
        for id in self.list_ids()? {
            if let Some(record) = self.get(&id)? {
                accounts.push(record);
            }
        }
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_paths;
    use tempfile::TempDir;

    fn test_store(temp_dir: &TempDir) -> AccountStore {
        AccountStore::new(setup_test_paths(temp_dir))
    }

    #[test]
    fn test_account_id_validation() {
        assert!(validate_account_id("700123456").is_ok());
        assert!(validate_account_id("main-acc").is_ok());

        assert!(validate_account_id("").is_err());
        assert!(validate_account_id(".").is_err());
        assert!(validate_account_id("..").is_err());
        assert!(validate_account_id("a/b").is_err());
        assert!(validate_account_id("a\\b").is_err());
        assert!(validate_account_id("a\0b").is_err());
    }

    #[test]
    fn test_get_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        assert!(store.get("100").unwrap().is_none());
        assert!(store.get("../escape").unwrap().is_none());
        assert!(!store.exists("100"));
    }

    #[test]
    fn test_put_blob_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        store.put("100", AccountUpdate::blob(b"registry A")).unwrap();

        let record = store.get("100").unwrap().unwrap();
        assert_eq!(record.blob.as_deref(), Some(&b"registry A"[..]));
        assert!(record.name.is_none());
        assert!(store.exists("100"));
    }

    #[test]
    fn test_put_fields_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        // Name before any blob: partition exists, blob absent
        store.put("100", AccountUpdate::name("Main")).unwrap();
        let record = store.get("100").unwrap().unwrap();
        assert_eq!(record.name.as_deref(), Some("Main"));
        assert!(!record.has_blob());

        // Blob write keeps the name
        store.put("100", AccountUpdate::blob(b"blob")).unwrap();
        let record = store.get("100").unwrap().unwrap();
        assert_eq!(record.name.as_deref(), Some("Main"));
        assert!(record.has_blob());

        // Name write keeps the blob
        store.put("100", AccountUpdate::name("Alt")).unwrap();
        let record = store.get("100").unwrap().unwrap();
        assert_eq!(record.name.as_deref(), Some("Alt"));
        assert_eq!(record.blob.as_deref(), Some(&b"blob"[..]));
    }

    #[test]
    fn test_put_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        let update = AccountUpdate::blob(b"same").with_name(Some("Main"));

        store.put("100", update).unwrap();
        let first = store.get("100").unwrap();
        store.put("100", update).unwrap();
        assert_eq!(store.get("100").unwrap(), first);
        assert_eq!(store.list_ids().unwrap(), vec!["100"]);
    }

    #[test]
    fn test_put_rejects_invalid_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        let err = store.put("../x", AccountUpdate::blob(b"x")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SwitchError>(),
            Some(&SwitchError::InvalidAccountId("../x".to_string()))
        );
    }

    #[test]
    fn test_config_json_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        store.put("100", AccountUpdate::name("Main")).unwrap();

        let content = fs::read_to_string(store.paths().account_config("100")).unwrap();
        assert_eq!(content, "{\n    \"uid\": \"100\",\n    \"name\": \"Main\"\n}");
    }

    #[test]
    fn test_reads_config_written_elsewhere() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        let dir = store.paths().account_dir("100");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), r#"{"uid": "100", "name": "Old"}"#).unwrap();

        assert_eq!(store.name("100").unwrap().as_deref(), Some("Old"));
    }

    #[test]
    fn test_corrupt_config_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        let dir = store.paths().account_dir("100");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), "not json").unwrap();

        assert!(store.get("100").is_err());
    }

    #[test]
    fn test_blob_ignores_corrupt_config() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        store.put("100", AccountUpdate::blob(b"registry A")).unwrap();
        fs::write(store.paths().account_config("100"), "not json").unwrap();

        assert_eq!(store.blob("100").unwrap().as_deref(), Some(&b"registry A"[..]));
        assert!(store.blob("200").unwrap().is_none());
        assert!(store.blob("../escape").unwrap().is_none());
    }

    #[test]
    fn test_list_ids_natural_order_skips_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        for id in ["1000", "999", "5"] {
            store.put(id, AccountUpdate::blob(b"x")).unwrap();
        }
        fs::write(store.paths().accounts_dir.join("stray.txt"), "x").unwrap();

        assert_eq!(store.list_ids().unwrap(), vec!["5", "999", "1000"]);
    }

    #[test]
    fn test_list_ids_without_accounts_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        assert!(store.list_ids().unwrap().is_empty());
    }

    #[test]
    fn test_list_accounts() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        store.put("200", AccountUpdate::name("Alt")).unwrap();
        store.put("100", AccountUpdate::blob(b"a")).unwrap();

        let accounts = store.list_accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, "100");
        assert!(accounts[0].has_blob());
        assert_eq!(accounts[1].name.as_deref(), Some("Alt"));
        assert!(!accounts[1].has_blob());
    }
}
