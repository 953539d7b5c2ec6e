#![deny(clippy::mod_module_files)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use framework_storage::config::expand_tilde;
use framework_storage::{FrameworkStorage, StorageConfig};

mod commands;

/// Inspect the history recorded for framework lessons
#[derive(Debug, Parser)]
#[command(name = "framework-storage", version)]
struct Cli {
    /// Project root; the store is looked up inside it
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Store directory, overriding the project and config lookup
    #[arg(long, global = true, conflicts_with = "project")]
    storage: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List stage refs and their head commits
    Refs,
    /// Show the history of a stage ref
    Log { ref_name: String },
    /// Show one commit
    Show { commit: String },
    /// List the files of a snapshot, or print one of them
    Snapshot {
        hash: String,
        #[arg(long)]
        file: Option<String>,
    },
    /// Compare a commit with the files in a directory
    Diff { commit: String, dir: PathBuf },
    /// Verify that every ref and everything it reaches can be read
    Check,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = StorageConfig::load()?;
    let storage_path = match &cli.storage {
        Some(path) => expand_tilde(path),
        None => {
            let project = match &cli.project {
                Some(project) => project.clone(),
                None => std::env::current_dir().context("Could not determine current directory")?,
            };
            config.storage_path(&project)
        }
    };
    if !storage_path.is_dir() {
        anyhow::bail!("no framework storage at {}", storage_path.display());
    }
    tracing::debug!("using framework storage at {:?}", storage_path);

    let storage = FrameworkStorage::open_with_config(&storage_path, &config)
        .with_context(|| format!("Failed to open framework storage at {:?}", storage_path))?;

    let stdout = io::stdout();
    let mut output = stdout.lock();
    match cli.command {
        Command::Refs => commands::refs::handle(&storage, &mut output, cli.json)?,
        Command::Log { ref_name } => {
            commands::log::handle(&storage, &mut output, &ref_name, cli.json)?
        }
        Command::Show { commit } => commands::show::handle(&storage, &mut output, &commit, cli.json)?,
        Command::Snapshot { hash, file } => {
            commands::snapshot::handle(&storage, &mut output, &hash, file.as_deref(), cli.json)?
        }
        Command::Diff { commit, dir } => {
            commands::diff::handle(&storage, &mut output, &commit, &dir, cli.json)?
        }
        Command::Check => commands::check::handle(&storage, &mut output, cli.json)?,
    }
    output.flush()?;

    Ok(())
}
