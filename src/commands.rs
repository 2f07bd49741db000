//! High-level command orchestration for the CLI.
//!
//! Each function here corresponds to a subcommand in `main.rs`. It wires the
//! account store and the located game installation into the operations in
//! `crate::switch`, and turns the outcome into terminal output via `crate::ui`.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use comfy_table::Table;
use inquire::Select;
use tracing::{debug, warn};

use crate::active::{ActiveSnapshot, ActiveState};
use crate::doctor::run_doctor;
use crate::error::SwitchError;
use crate::installation::{GameInstallation, InstallSource};
use crate::paths::Paths;
use crate::state::State;
use crate::store::{AccountRecord, AccountStore};
use crate::switch::{self, Backup, resolve, switch_account};
use crate::ui::{MenuEntry, Ui};

/// Register the active game account
pub fn register(paths: &Paths, source: &InstallSource, name: Option<&str>, ui: &Ui) -> Result<()> {
    paths.ensure_dirs()?;
    let store = AccountStore::new(paths.clone());
    let current = source.open()?.read()?;

    let registration = switch::register(&store, &current, name)?;
    let record = &registration.record;
    let label = ui.account_label(&record.id, record.name.as_deref());

    if registration.newly_added {
        ui.ok(format!("Registered account {}", label));
    } else {
        ui.ok(format!("Updated stored credentials for account {}", label));
    }
    Ok(())
}

/// Resolve `token` and switch to that account
///
/// Without a token the numbered account list is printed, or with
/// `interactive` the user picks from a menu.
pub fn switch(
    paths: &Paths,
    source: &InstallSource,
    token: Option<&str>,
    interactive: bool,
    ui: &Ui,
) -> Result<()> {
    let store = AccountStore::new(paths.clone());
    let known = store.list_ids()?;

    if known.is_empty() {
        bail!(
            "Could not find any registered accounts.\nHint: Log into the game, then run 'gaswitch register'."
        );
    }

    let mut game = source.open()?;
    let current = game.read()?;

    let target = match resolve(token, &known) {
        Ok(id) => id,
        Err(SwitchError::AmbiguousSelection(known)) if interactive => {
            pick_account(&store, &known, &current, ui)?
        }
        Err(SwitchError::AmbiguousSelection(known)) => {
            ui.section("Available accounts:");
            ui.print_menu(&menu_entries(&store, &known, &current));
            ui.newline();
            ui.println(format!(
                "Switch with {} or {}",
                ui.bold("gaswitch switch <INDEX|ID>"),
                ui.bold("gaswitch switch --interactive")
            ));
            return Ok(());
        }
        Err(err @ SwitchError::UnknownAccount { .. }) => {
            ui.section("Available options are:");
            let candidates = err.candidates().unwrap_or_default();
            ui.print_menu(&menu_entries(&store, candidates, &current));
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let label = display_label(&store, &target, ui);
    let spinner = ui.spinner(format!("Switching to account {}...", label));

    let backup = match switch_account(&store, &target, &current, &mut game) {
        Ok(backup) => backup,
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to switch: {}", e));
            return Err(e);
        }
    };

    if let Err(e) = State::record_switch(&paths.state_file, &target) {
        warn!(error = %e, "could not record last switch");
    }

    ui.spinner_finish_ok(&spinner, format!("Switched to account {}", label));
    match backup {
        Backup::Saved(id) => ui.info(format!(
            "Backed up previous account {}",
            display_label(&store, &id, ui)
        )),
        Backup::Unchanged(id) => debug!(account = %id, "previous account already up to date"),
        Backup::Skipped => debug!("no previous account to back up"),
    }
    Ok(())
}

/// Interactive account picker over the resolved account order
fn pick_account(
    store: &AccountStore,
    known: &[String],
    current: &ActiveSnapshot,
    ui: &Ui,
) -> Result<String> {
    let options: Vec<String> = menu_entries(store, known, current)
        .iter()
        .map(|entry| {
            let label = ui.account_label(&entry.id, entry.name.as_deref());
            if entry.active {
                format!("{} (active)", label)
            } else {
                label
            }
        })
        .collect();

    let choice = Select::new("Switch to which account?", options)
        .with_help_message("↑↓ to move, Enter to select")
        .raw_prompt()
        .context("Account selection cancelled")?;

    Ok(known[choice.index].clone())
}

/// Show the active account
pub fn current(paths: &Paths, source: &InstallSource, ui: &Ui) -> Result<()> {
    let store = AccountStore::new(paths.clone());
    let game = source.open()?;
    let snapshot = game.read()?;

    let Some(table) = current_table(paths, &store, &game, &snapshot, ui) else {
        ui.warn("No account could be found, have you logged into the game yet?");
        return Ok(());
    };

    ui.section("Current Account");
    ui.newline();
    ui.println(table.to_string());
    Ok(())
}

/// Key/value rows describing the active account; `None` without a session
fn current_table(
    paths: &Paths,
    store: &AccountStore,
    game: &GameInstallation,
    snapshot: &ActiveSnapshot,
    ui: &Ui,
) -> Option<Table> {
    let id = snapshot.id()?;

    let mut table = ui.simple_table();
    table.add_row(vec![
        ui.cell("Active account:"),
        ui.header_cell(display_label(store, id, ui)),
    ]);

    let registered = if store.exists(id) {
        ui.colored_cell("yes", AnsiColor::Green)
    } else {
        ui.colored_cell("no (run 'gaswitch register')", AnsiColor::Yellow)
    };
    table.add_row(vec![ui.cell("Registered:"), registered]);

    if snapshot.blob().is_none() {
        table.add_row(vec![
            ui.cell("Credentials:"),
            ui.colored_cell("missing user.reg", AnsiColor::Red),
        ]);
    }

    table.add_row(vec![
        ui.cell("Installation:"),
        ui.cell(game.root().display().to_string()),
    ]);

    match State::read(&paths.state_file) {
        Ok(State {
            last_account: Some(last),
            switched_at,
        }) => {
            let when = switched_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            table.add_row(vec![
                ui.cell("Last switch:"),
                ui.cell(format!("{} at {}", display_label(store, &last, ui), when)),
            ]);
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "ignoring unreadable state file"),
    }

    Some(table)
}

/// List all registered accounts
pub fn list(paths: &Paths, source: &InstallSource, ui: &Ui) -> Result<()> {
    let store = AccountStore::new(paths.clone());
    let accounts = store.list_accounts()?;

    if accounts.is_empty() {
        ui.warn("No accounts registered.");
        ui.newline();
        ui.println("Log into the game, then register the account with:");
        ui.println(format!("  {} register --name <NAME>", ui.bold("gaswitch")));
        return Ok(());
    }

    // The list is still useful without a reachable installation
    let active = match source.open().and_then(|game| game.read()) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!(error = %e, "active account unavailable");
            ActiveSnapshot::empty()
        }
    };

    ui.section("Accounts");
    ui.println(accounts_table(&accounts, &active, ui).to_string());
    Ok(())
}

fn accounts_table(accounts: &[AccountRecord], active: &ActiveSnapshot, ui: &Ui) -> Table {
    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("#"),
        ui.header_cell("Id"),
        ui.header_cell("Name"),
        ui.header_cell("Credentials"),
        ui.header_cell("Status"),
    ]);

    for (index, account) in accounts.iter().enumerate() {
        let is_active = active.is_active(&account.id);
        let icon = if is_active { ui.icon_ok() } else { " " };
        let credentials = if account.has_blob() {
            ui.cell("stored")
        } else {
            ui.colored_cell("missing", AnsiColor::Red)
        };
        let status = if is_active {
            ui.colored_cell("active", AnsiColor::Green)
        } else {
            ui.cell("-")
        };

        table.add_row(vec![
            ui.cell(icon),
            ui.cell(index.to_string()),
            ui.cell(&account.id),
            ui.cell(account.name.clone().unwrap_or_else(|| ui.dim("-"))),
            credentials,
            status,
        ]);
    }

    table
}

/// Set the display name of a registered account
pub fn set_name(paths: &Paths, id: &str, name: &str, ui: &Ui) -> Result<()> {
    let store = AccountStore::new(paths.clone());
    switch::rename(&store, id, name).map_err(|e| {
        if let Some(SwitchError::UnknownAccount { .. }) = e.downcast_ref::<SwitchError>() {
            e.context(format!(
                "Unknown account id '{}', did you already register it?",
                id
            ))
        } else {
            e
        }
    })?;

    ui.ok(format!("Saved {}", ui.account_label(id, Some(name))));
    Ok(())
}

/// Run diagnostics
pub fn doctor(paths: &Paths, source: &InstallSource, ui: &Ui) -> Result<()> {
    run_doctor(paths, source, ui);
    Ok(())
}

fn display_label(store: &AccountStore, id: &str, ui: &Ui) -> String {
    let name = store.name(id).unwrap_or_else(|e| {
        debug!(account = id, error = %e, "could not read account name");
        None
    });
    ui.account_label(id, name.as_deref())
}

fn menu_entries(store: &AccountStore, ids: &[String], current: &ActiveSnapshot) -> Vec<MenuEntry> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| MenuEntry {
            index,
            id: id.clone(),
            name: store.name(id).ok().flatten(),
            active: current.is_active(id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AccountUpdate;
    use comfy_table::Cell;
    use crate::test_utils::setup_test_paths;
    use crate::ui::ColorMode;
    use std::fs;
    use tempfile::TempDir;

    fn test_ui() -> Ui {
        Ui::new(ColorMode::Never, false)
    }

    /// Fake game directory with `id` logged in, opened as the current login
    fn setup_game(temp_dir: &TempDir, id: &str, blob: &[u8]) -> (InstallSource, GameInstallation) {
        let root = temp_dir.path().join("game");
        let mut game = GameInstallation::new(&root, "tester");
        game.write(id, blob).unwrap();
        (InstallSource::explicit(root).with_login("tester"), game)
    }

    #[test]
    fn test_register_and_switch() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let (source, mut game) = setup_game(&temp_dir, "100", b"blob_A");

        register(&paths, &source, Some("Main"), &ui).unwrap();
        game.write("200", b"blob_B").unwrap();
        register(&paths, &source, None, &ui).unwrap();

        // Index 0 is "100" in natural order
        switch(&paths, &source, Some("0"), false, &ui).unwrap();

        let snapshot = game.read().unwrap();
        assert_eq!(snapshot.id(), Some("100"));
        assert_eq!(snapshot.blob(), Some(&b"blob_A"[..]));

        let state = State::read(&paths.state_file).unwrap();
        assert_eq!(state.last_account.as_deref(), Some("100"));
    }

    #[test]
    fn test_switch_without_token_lists_and_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let (source, game) = setup_game(&temp_dir, "100", b"blob_A");
        register(&paths, &source, None, &ui).unwrap();

        switch(&paths, &source, None, false, &ui).unwrap();

        assert_eq!(game.read().unwrap(), ActiveSnapshot::new(Some("100"), Some(&b"blob_A"[..])));
        assert!(!paths.state_file.exists());
    }

    #[test]
    fn test_switch_unknown_account() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let (source, _game) = setup_game(&temp_dir, "100", b"blob_A");
        register(&paths, &source, None, &ui).unwrap();

        let err = switch(&paths, &source, Some("777"), false, &ui).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SwitchError>(),
            Some(SwitchError::UnknownAccount { .. })
        ));
    }

    #[test]
    fn test_switch_with_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let source = InstallSource::explicit(temp_dir.path().to_path_buf());

        assert!(switch(&paths, &source, Some("0"), false, &test_ui()).is_err());
    }

    #[test]
    fn test_register_without_installation() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let source = InstallSource::explicit(temp_dir.path().join("missing"));

        let err = register(&paths, &source, None, &test_ui()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SwitchError>(),
            Some(&SwitchError::NoInstallationFound)
        );
    }

    fn table_rows(table: &Table) -> Vec<Vec<String>> {
        table
            .row_iter()
            .map(|row| row.cell_iter().map(Cell::content).collect())
            .collect()
    }

    #[test]
    fn test_current_table() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let store = AccountStore::new(paths.clone());
        let (source, game) = setup_game(&temp_dir, "100", b"blob_A");

        let snapshot = game.read().unwrap();
        let table = current_table(&paths, &store, &game, &snapshot, &ui).unwrap();
        let rows = table_rows(&table);
        assert_eq!(rows[0], vec!["Active account:", "'100'"]);
        assert_eq!(rows[1], vec!["Registered:", "no (run 'gaswitch register')"]);
        assert_eq!(rows[2][0], "Installation:");
        assert_eq!(rows.len(), 3);

        register(&paths, &source, Some("Main"), &ui).unwrap();
        State::record_switch(&paths.state_file, "100").unwrap();

        let table = current_table(&paths, &store, &game, &snapshot, &ui).unwrap();
        let rows = table_rows(&table);
        assert_eq!(rows[0], vec!["Active account:", "Main (100)"]);
        assert_eq!(rows[1], vec!["Registered:", "yes"]);
        assert_eq!(rows[3][0], "Last switch:");
        assert!(rows[3][1].starts_with("Main (100) at "));

        assert!(current(&paths, &source, &ui).is_ok());
    }

    #[test]
    fn test_current_table_without_credentials() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let store = AccountStore::new(paths.clone());
        let game = GameInstallation::new(temp_dir.path(), "tester");

        let snapshot = ActiveSnapshot::new(Some("100"), None);
        let table = current_table(&paths, &store, &game, &snapshot, &test_ui()).unwrap();
        assert!(table_rows(&table).contains(&vec![
            "Credentials:".to_string(),
            "missing user.reg".to_string()
        ]));

        assert!(current_table(&paths, &store, &game, &ActiveSnapshot::empty(), &test_ui()).is_none());
    }

    #[test]
    fn test_accounts_table() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let store = AccountStore::new(paths.clone());
        store.put("1000", AccountUpdate::blob(b"a")).unwrap();
        store
            .put("999", AccountUpdate::blob(b"b").with_name(Some("Main")))
            .unwrap();
        store.put("5", AccountUpdate::name("Pending")).unwrap();

        let accounts = store.list_accounts().unwrap();
        let active = ActiveSnapshot::new(Some("999"), Some(&b"b"[..]));
        let rows = table_rows(&accounts_table(&accounts, &active, &ui));

        assert_eq!(rows[0], vec![" ", "0", "5", "Pending", "missing", "-"]);
        assert_eq!(rows[1], vec!["[OK]", "1", "999", "Main", "stored", "active"]);
        assert_eq!(rows[2], vec![" ", "2", "1000", "-", "stored", "-"]);

        let (source, _game) = setup_game(&temp_dir, "999", b"b");
        assert!(list(&paths, &source, &ui).is_ok());
    }

    #[test]
    fn test_current_without_session() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let source = InstallSource::explicit(temp_dir.path()).with_login("tester");

        assert!(current(&paths, &source, &test_ui()).is_ok());
    }

    #[test]
    fn test_set_name() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let store = AccountStore::new(paths.clone());
        store.put("100", AccountUpdate::blob(b"a")).unwrap();

        set_name(&paths, "100", "Main", &ui).unwrap();
        assert_eq!(store.name("100").unwrap().as_deref(), Some("Main"));

        let err = set_name(&paths, "777", "Nope", &ui).unwrap_err();
        assert!(err.to_string().contains("did you already register it"));
        assert!(!store.exists("777"));
        assert_eq!(fs::read_dir(&paths.accounts_dir).unwrap().count(), 1);
    }
}
