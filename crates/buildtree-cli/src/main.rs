use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use buildtree_planner::WizardMode;
use tracing_subscriber::EnvFilter;

mod completion;
mod config;
mod flows;
mod render;

use completion::CliCompletionShell;
use config::{load_config_file, Settings};
use render::TerminalRenderer;

#[derive(Parser, Debug)]
#[command(name = "buildtree")]
#[command(about = "Download, build and install a tree of source packages", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Flags that override values from `buildtree.toml`.
#[derive(Args, Debug, Default, Clone)]
struct GlobalArgs {
    /// Configuration file; defaults to `buildtree.toml` in the current directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// XML package manifest.
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,
    /// Directory archives are downloaded to and built in.
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,
    /// Installation prefix passed to `./configure --prefix`.
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,
    /// pnet installation; adds `ILDJIT_PATH` to the shell exports.
    #[arg(long, global = true)]
    pnet_dir: Option<PathBuf>,
    /// Extra arguments appended to every `./configure` call.
    #[arg(long, global = true, allow_hyphen_values = true)]
    configure_options: Option<String>,
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download and build every package of the tree.
    Install {
        #[arg(long)]
        yes: bool,
    },
    /// Reinstall outdated packages and refresh everything that depends on them.
    Upgrade {
        #[arg(long)]
        yes: bool,
    },
    /// Rebuild an up-to-date installation from its existing build directories.
    Rebuild {
        #[arg(long)]
        yes: bool,
    },
    /// Show what a run would do without building anything.
    Plan {
        #[arg(value_enum)]
        mode: CliWizardMode,
        #[arg(long)]
        json: bool,
    },
    /// Print the package tree from the manifest.
    Tree {
        /// Query the release listings and show the latest versions.
        #[arg(long)]
        versions: bool,
    },
    /// Print the shell exports for the installed tree.
    Env {
        /// Append the exports to a shell profile (default `~/.bashrc`).
        #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
        write_profile: Option<PathBuf>,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliWizardMode {
    Install,
    Upgrade,
    Rebuild,
}

impl From<CliWizardMode> for WizardMode {
    fn from(value: CliWizardMode) -> Self {
        match value {
            CliWizardMode::Install => WizardMode::Install,
            CliWizardMode::Upgrade => WizardMode::Upgrade,
            CliWizardMode::Rebuild => WizardMode::Rebuild,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    run_cli(cli)
}

fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_cli(cli: Cli) -> Result<()> {
    let renderer = TerminalRenderer::current();

    let settings = || -> Result<Settings> {
        let file = load_config_file(cli.global.config.as_deref())?;
        Settings::resolve(file, &cli.global)
    };

    match cli.command {
        Commands::Install { yes } => {
            flows::run_wizard(&settings()?, WizardMode::Install, yes, renderer)?
        }
        Commands::Upgrade { yes } => {
            flows::run_wizard(&settings()?, WizardMode::Upgrade, yes, renderer)?
        }
        Commands::Rebuild { yes } => {
            flows::run_wizard(&settings()?, WizardMode::Rebuild, yes, renderer)?
        }
        Commands::Plan { mode, json } => {
            flows::run_plan(&settings()?, mode.into(), json, renderer)?
        }
        Commands::Tree { versions } => flows::run_tree(&settings()?, versions)?,
        Commands::Env { write_profile } => {
            flows::run_env(&settings()?, write_profile, renderer)?
        }
        Commands::Completions { shell } => {
            completion::write_completions_script(shell, &mut std::io::stdout())?
        }
    }

    Ok(())
}
