//! reconf CLI
//!
//! Imports monitoring configuration snapshots into a JSON store file.
//!
//! # Commands
//!
//! - `import` - Reconcile a store with a snapshot
//! - `validate` - Check a snapshot and parse its expressions
//! - `inspect` - Count the rows of a store per entity kind

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::import::Role;
use commands::Format;
use error::CliResult;
use reconf_import::ImportConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Monitoring configuration import tools.
#[derive(Parser)]
#[command(name = "reconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a store with a snapshot
    Import {
        /// Store file, created on first import
        #[arg(long)]
        store: PathBuf,

        /// Snapshot file
        #[arg(long)]
        snapshot: PathBuf,

        /// JSON file with per-kind import policies
        #[arg(long, conflicts_with_all = ["create_all", "full_sync"])]
        options: Option<PathBuf>,

        /// Create missing entities of every kind (the default)
        #[arg(long, conflicts_with = "full_sync")]
        create_all: bool,

        /// Create, update and delete every kind
        #[arg(long)]
        full_sync: bool,

        /// Role of the importing user
        #[arg(long, value_enum, default_value_t = Role::SuperAdmin)]
        role: Role,

        /// Roll back after a successful run
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Check a snapshot without touching any store
    Validate {
        /// Snapshot file
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Count the rows of a store per entity kind
    Inspect {
        /// Store file
        #[arg(long)]
        store: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(command: Commands) -> CliResult<()> {
    match command {
        Commands::Import {
            store,
            snapshot,
            options,
            create_all: _,
            full_sync,
            role,
            dry_run,
            format,
        } => {
            let options = commands::import::resolve_options(options.as_deref(), full_sync)?;
            let config = ImportConfig::new().role(role.into()).dry_run(dry_run);
            let report = commands::import::run(&store, &snapshot, options, config)?;
            commands::import::print_report(&report, format)?;
        }
        Commands::Validate { snapshot } => {
            let result = commands::validate::run(&snapshot)?;
            println!(
                "{}: {} hosts and templates, {} expressions, valid",
                snapshot.display(),
                result.hosts,
                result.expressions
            );
        }
        Commands::Inspect { store, format } => {
            let result = commands::inspect::run(&store)?;
            commands::inspect::print_result(&result, format)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
