//! Account resolution and switching.
//!
//! This module holds the core operations of `gaswitch`:
//! - Resolving a user token (list index or literal id) to a stored account.
//! - Registering the active account into the store.
//! - Switching: backing up the active account, then installing the target.
//! - Renaming a stored account.
//!
//! Every precondition is checked before the first write. The only
//! non-atomic point is the final two-file write to the game installation.

use anyhow::Result;
use tracing::debug;

use crate::active::{ActiveSnapshot, ActiveState};
use crate::error::SwitchError;
use crate::store::{AccountRecord, AccountStore, AccountUpdate};

/// Turn a user token into one of `known_ids`
///
/// A token made only of digits that indexes into `known_ids` is taken as a
/// position, even when it is also a literal id elsewhere in the list.
/// Otherwise the token must equal a known id.
pub fn resolve(token: Option<&str>, known_ids: &[String]) -> Result<String, SwitchError> {
    let token = match token.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Err(SwitchError::AmbiguousSelection(known_ids.to_vec())),
    };

    if token.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(id) = token
            .parse::<usize>()
            .ok()
            .and_then(|index| known_ids.get(index))
        {
            debug!(token, account = %id, "resolved token as list index");
            return Ok(id.clone());
        }
    }

    if let Some(id) = known_ids.iter().find(|id| id.as_str() == token) {
        return Ok(id.clone());
    }

    Err(SwitchError::UnknownAccount {
        token: token.to_string(),
        known: known_ids.to_vec(),
    })
}

/// What happened to the previously active account during a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backup {
    /// Nothing was active, or the active credential file was missing
    Skipped,
    /// The stored blob already matched the active one
    Unchanged(String),
    /// The active blob was written into the store under this id
    Saved(String),
}

/// Result of registering the active account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub record: AccountRecord,
    /// False when the account was already registered and got refreshed
    pub newly_added: bool,
}

/// Capture the active account into the store
pub fn register(
    store: &AccountStore,
    current: &ActiveSnapshot,
    name: Option<&str>,
) -> Result<Registration> {
    let id = current.id().ok_or(SwitchError::NoActiveAccount)?;
    let blob = current.blob().ok_or(SwitchError::NoCredentialBlob)?;

    let newly_added = !store.exists(id);
    store.put(id, AccountUpdate::blob(blob).with_name(name))?;
    debug!(account = id, newly_added, "registered active account");

    // The blob is already stored, so an unreadable alias only loses the name
    let name = match name {
        Some(name) => Some(name.to_string()),
        None => store.name(id).unwrap_or_else(|e| {
            debug!(account = id, error = %e, "could not read account name");
            None
        }),
    };
    let record = AccountRecord {
        id: id.to_string(),
        name,
        blob: Some(blob.to_vec()),
    };
    Ok(Registration {
        record,
        newly_added,
    })
}

/// Back up the active account, then install `target_id` as the active one
///
/// Fails with [`SwitchError::NoStoredCredential`] before any write if the
/// target has no stored blob.
pub fn switch_account<A: ActiveState + ?Sized>(
    store: &AccountStore,
    target_id: &str,
    current: &ActiveSnapshot,
    active: &mut A,
) -> Result<Backup> {
    if store.blob(target_id)?.is_none() {
        return Err(SwitchError::NoStoredCredential(target_id.to_string()).into());
    }

    let backup = backup_active(store, current)?;

    // Fetched after the backup so switching to the active account is a no-op
    let target_blob = store
        .blob(target_id)?
        .ok_or_else(|| SwitchError::NoStoredCredential(target_id.to_string()))?;

    active.write(target_id, &target_blob)?;
    debug!(account = target_id, ?backup, "switched active account");

    Ok(backup)
}

/// Save whatever is active under its own id, registered or not
fn backup_active(store: &AccountStore, current: &ActiveSnapshot) -> Result<Backup> {
    let (Some(id), Some(blob)) = (current.id(), current.blob()) else {
        return Ok(Backup::Skipped);
    };

    let stored = store.blob(id)?;
    if stored.as_deref() == Some(blob) {
        return Ok(Backup::Unchanged(id.to_string()));
    }

    store.put(id, AccountUpdate::blob(blob))?;
    Ok(Backup::Saved(id.to_string()))
}

/// Set the display name of a registered account, leaving its blob untouched
pub fn rename(store: &AccountStore, id: &str, new_name: &str) -> Result<()> {
    if !store.exists(id) {
        return Err(SwitchError::UnknownAccount {
            token: id.to_string(),
            known: store.list_ids()?,
        }
        .into());
    }

    store.put(id, AccountUpdate::name(new_name))
}
