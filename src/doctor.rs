//! Diagnostic tool for gaswitch.
//!
//! Implements `gaswitch doctor`, which checks:
//! - The config root and accounts directory.
//! - Game installation discovery.
//! - The active account inside the installation.
//! - Every stored account (credentials present, config.json readable).
//! - The last-switch state file.

use anstyle::AnsiColor;

use crate::active::ActiveState;
use crate::error::SwitchError;
use crate::installation::InstallSource;
use crate::paths::Paths;
use crate::state::State;
use crate::store::AccountStore;
use crate::ui::Ui;

/// Run the doctor diagnostics
pub fn run_doctor(paths: &Paths, source: &InstallSource, ui: &Ui) {
    ui.section("gaswitch Doctor");
    ui.newline();

    check_step(ui, "Directories", || {
        if paths.accounts_dir.is_dir() {
            ui.println(format!(
                "  {} Accounts directory exists: {}",
                ui.icon_ok(),
                paths.accounts_dir.display()
            ));
        } else {
            // Created by the first register
            ui.println(format!(
                "  {} Accounts directory missing: {}",
                ui.icon_warn(),
                paths.accounts_dir.display()
            ));
        }
        true
    });

    let mut game = None;
    check_step(ui, "Game Installation", || match source.locate() {
        Ok(root) => {
            ui.println(format!("  {} Installation: {}", ui.icon_ok(), root.display()));
            match source.open_at(root) {
                Ok(found) => {
                    game = Some(found);
                    true
                }
                Err(e) => {
                    ui.println(format!("  {} {}", ui.icon_err(), e));
                    false
                }
            }
        }
        Err(SwitchError::AmbiguousInstallation(dirs)) => {
            ui.println(format!(
                "  {} More than one installation found, pass --install-dir to pick one:",
                ui.icon_err()
            ));
            for dir in dirs {
                ui.println(format!("    {} {}", ui.icon_info(), dir.display()));
            }
            false
        }
        Err(e) => {
            ui.println(format!("  {} {}", ui.icon_err(), e));
            false
        }
    });

    let store = AccountStore::new(paths.clone());

    if let Some(game) = &game {
        check_step(ui, "Active Account", || match game.read() {
            Ok(snapshot) => {
                let mut ok = true;
                match snapshot.id() {
                    Some(id) if store.exists(id) => ui.println(format!(
                        "  {} Active account {} is registered",
                        ui.icon_ok(),
                        id
                    )),
                    Some(id) => ui.println(format!(
                        "  {} Active account {} is not registered",
                        ui.icon_warn(),
                        id
                    )),
                    None => {
                        ui.println(format!(
                            "  {} No active account id: {}",
                            ui.icon_warn(),
                            game.uid_file().display()
                        ));
                    }
                }
                if snapshot.blob().is_none() {
                    ui.println(format!(
                        "  {} Credential file missing: {}",
                        ui.icon_err(),
                        game.registry_file().display()
                    ));
                    ok = false;
                }
                ok
            }
            Err(e) => {
                ui.println(format!("  {} Failed to read active account: {:#}", ui.icon_err(), e));
                false
            }
        });
    }

    check_step(ui, "Accounts", || {
        let ids = match store.list_ids() {
            Ok(ids) => ids,
            Err(e) => {
                ui.println(format!("  {} Failed to list accounts: {:#}", ui.icon_err(), e));
                return false;
            }
        };

        if ids.is_empty() {
            ui.println(format!("  {} No accounts registered", ui.icon_warn()));
            return true;
        }

        ui.println(format!("  Found {} accounts:", ids.len()));
        let mut all_valid = true;

        for id in ids {
            let problems = account_problems(&store, &id);
            if problems.is_empty() {
                ui.println(format!("    {} {}", ui.icon_ok(), id));
            } else {
                all_valid = false;
                ui.println(format!(
                    "    {} {} ({})",
                    ui.icon_warn(),
                    id,
                    problems.join(", ")
                ));
            }
        }
        all_valid
    });

    check_step(ui, "State File", || match State::read(&paths.state_file) {
        Ok(State {
            last_account: Some(last),
            ..
        }) => {
            ui.println(format!("  {} Last switched to: {}", ui.icon_info(), last));
            if !store.exists(&last) {
                ui.println(format!(
                    "  {} Last switched account is no longer stored",
                    ui.icon_warn()
                ));
            }
            true
        }
        Ok(_) => {
            ui.println(format!("  {} No switch recorded yet", ui.icon_info()));
            true
        }
        Err(e) => {
            // Replaced on the next switch
            ui.println(format!("  {} State file corrupt: {:#}", ui.icon_warn(), e));
            true
        }
    });
}

/// Problems with one stored account; empty when it is healthy
pub fn account_problems(store: &AccountStore, id: &str) -> Vec<String> {
    let mut problems = Vec::new();

    match store.read_config(id) {
        Ok(Some(config)) if config.uid != id => {
            problems.push(format!("config.json names uid '{}'", config.uid));
        }
        Ok(_) => {}
        Err(e) => problems.push(format!("unreadable config.json: {:#}", e)),
    }

    if !store.paths().account_blob(id).is_file() {
        problems.push("no stored credentials".to_string());
    }

    problems
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F)
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    if !check_fn() {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
}
