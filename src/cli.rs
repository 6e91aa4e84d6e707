//! Command-line interface implementation

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::build::{BuildContext, BuildPipeline, ConsoleProgress};
use crate::config::{find_config, load_config, merge_cli_overrides, CliOverrides};
use crate::converter::ConverterRegistry;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// bake - Incremental asset builder for game projects
#[derive(Parser)]
#[command(name = "bake")]
#[command(about = "Incremental asset builder for game projects")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert stale source assets into the export directory
    Build {
        /// Path to bakery.toml (default: search upward from the
        /// current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the asset source directory
        #[arg(long)]
        asset_dir: Option<PathBuf>,

        /// Override the export directory
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Worker pool size (0 = number of CPUs)
        #[arg(short, long)]
        jobs: Option<i64>,

        /// Show diagnostic output
        #[arg(short, long)]
        verbose: bool,

        /// Announce jobs as they start, not only as they finish
        #[arg(long)]
        show_all_jobs: bool,

        /// Plan the build and report it without running any job
        #[arg(long)]
        dry_run: bool,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            asset_dir,
            export_dir,
            jobs,
            verbose,
            show_all_jobs,
            dry_run,
        } => {
            let overrides = CliOverrides {
                asset_dir,
                export_dir,
                jobs,
                verbose: if verbose { Some(true) } else { None },
            };
            run_build(config.as_deref(), &overrides, show_all_jobs, dry_run)
        }
    }
}

/// Execute the build command
fn run_build(
    config_path: Option<&std::path::Path>,
    overrides: &CliOverrides,
    show_all_jobs: bool,
    dry_run: bool,
) -> ExitCode {
    // An explicit --config must exist; an absent bakery.toml otherwise
    // just means a default-configured project rooted at the cwd.
    let config_path = match config_path {
        Some(path) => {
            if !path.is_file() {
                eprintln!("Error: Cannot open config file '{}'", path.display());
                return ExitCode::from(EXIT_INVALID_ARGS);
            }
            Some(path.to_path_buf())
        }
        None => find_config(),
    };

    let mut config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    merge_cli_overrides(&mut config, overrides);

    let project_root = match project_root_for(config_path.as_deref()) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: Cannot determine project root: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let reporter = ConsoleProgress::new()
        .with_verbose(config.general.verbose)
        .with_show_all_jobs(show_all_jobs || config.build.show_all_jobs);

    let registry = ConverterRegistry::with_builtins();
    let context = BuildContext::new(config, project_root);
    let pipeline = BuildPipeline::new(context)
        .with_registry(registry)
        .with_reporter(Arc::new(reporter))
        .with_dry_run(dry_run);

    // Ctrl-C requests a clean cancellation: in-flight jobs drain and the
    // build database is left untouched.
    let cancel = pipeline.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        eprintln!("Warning: cannot install Ctrl-C handler: {}", e);
    }

    match pipeline.build() {
        Ok(_) => ExitCode::from(EXIT_SUCCESS),
        Err(_) => ExitCode::from(EXIT_ERROR),
    }
}

/// The project root: the directory holding `bakery.toml`, or the current
/// directory when no config file exists.
fn project_root_for(config_path: Option<&std::path::Path>) -> std::io::Result<PathBuf> {
    match config_path.and_then(|p| p.parent()) {
        Some(dir) if dir.as_os_str().is_empty() => std::env::current_dir(),
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir(),
    }
}
