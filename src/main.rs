use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use gaswitch::{
    commands,
    error::SwitchError,
    installation::InstallSource,
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "gaswitch")]
#[command(about = "Quick and easy Genshin Impact account switcher")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding registered accounts
    #[arg(long, global = true, value_name = "PATH", env = "GASWITCH_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Game directory to use instead of searching the launcher locations
    #[arg(long, global = true, value_name = "PATH", env = "GASWITCH_INSTALL_DIR")]
    install_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the account currently logged into the game
    Register {
        /// Display name for the account
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Switch account by list index or id; without one, list the choices
    Switch {
        /// Index from the account list, or the account id
        token: Option<String>,

        /// Pick the account from a menu
        #[arg(short, long, conflicts_with = "token")]
        interactive: bool,
    },

    /// Show the current account
    Current,

    /// List registered accounts
    List,

    /// Set the display name for an account
    SetName {
        /// Account id
        id: String,
        /// New display name
        name: String,
    },

    /// Run diagnostics on the gaswitch setup
    Doctor,

    /// Print a shell completion script
    Completions {
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("gaswitch=debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, ui: &Ui) -> Result<()> {
    let paths = match &cli.config_dir {
        Some(dir) => Paths::with_root(dir),
        None => Paths::new()?,
    };

    // Completions and set-name never touch the game directory
    let source = || InstallSource::new(cli.install_dir.clone());

    match cli.command {
        Commands::Register { name } => commands::register(&paths, &source()?, name.as_deref(), ui),
        Commands::Switch { token, interactive } => {
            commands::switch(&paths, &source()?, token.as_deref(), interactive, ui)
        }
        Commands::Current => commands::current(&paths, &source()?, ui),
        Commands::List => commands::list(&paths, &source()?, ui),
        Commands::SetName { id, name } => commands::set_name(&paths, &id, &name, ui),
        Commands::Doctor => commands::doctor(&paths, &source()?, ui),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "gaswitch", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ui = Ui::new(cli.color, cli.no_color);

    match run(cli, &ui) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui.err(format!("{:#}", e));
            if let Some(SwitchError::AmbiguousInstallation(dirs)) = e.downcast_ref::<SwitchError>() {
                for dir in dirs {
                    ui.println(format!("* {}", dir.display()));
                }
            }
            ExitCode::FAILURE
        }
    }
}
