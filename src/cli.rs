//! Dockhand CLI: run the pipeline, manage data sources, inspect the queue.
//! Source editing stands in for the external admin API so the binary is
//! operable on its own.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::orchestrate::{install_ctrlc, run, shutdown_channel};
use crate::store::{Store, open_store};
use crate::types::UploadStatus;
use crate::upload::DirUploader;
use crate::utils::config::Settings;
use crate::utils::setup_logging;

/// Watched-folder upload daemon.
#[derive(Clone, Parser)]
#[command(name = "dockhand")]
#[command(about = "Watch data-source folders and deliver dropped files to a blob store.")]
pub struct Cli {
    /// Path to the dockhand database. Default: `dockhand.db` (or dockhand.toml / DOCKHAND_DB).
    #[arg(long, short)]
    pub db: Option<PathBuf>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Run the pipeline until interrupted (default).
    Run,
    /// Manage watched data sources.
    Source {
        #[command(subcommand)]
        cmd: SourceCmd,
    },
    /// Show queue items (audit view).
    Queue {
        /// Filter by status: pending, processing, uploading, completed, failed.
        #[arg(long, short)]
        status: Option<String>,
        /// Maximum rows to print.
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Clone, Subcommand)]
pub enum SourceCmd {
    /// Register a new data source (enabled immediately).
    Add {
        name: String,
        folder: PathBuf,
        /// File-name glob pattern.
        #[arg(long, short, default_value = "*")]
        pattern: String,
    },
    /// List configured sources.
    List,
    /// Enable a source; its watcher starts on the next tick.
    Enable { name: String },
    /// Disable a source; its watcher stops on the next tick.
    Disable { name: String },
    /// Flag a source so its watcher restarts on the next tick.
    Refresh { name: String },
}

/// Dispatch the parsed command.
pub fn handle(cli: &Cli) -> Result<()> {
    setup_logging(cli.verbose.unwrap_or(false));
    let mut settings = Settings::load(std::path::Path::new("."));
    if let Some(db) = &cli.db {
        settings.db_path = db.clone();
    }
    let store = open_store(&settings.db_path)?;

    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => handle_run(store, &settings),
        Commands::Source { cmd } => handle_source(&store, &cmd),
        Commands::Queue { status, limit } => handle_queue(&store, status.as_deref(), limit),
    }
}

fn handle_run(store: Store, settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(&settings.upload_root)?;
    let uploader = Arc::new(DirUploader::new(settings.upload_root.clone()));
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    install_ctrlc(shutdown_tx)?;
    run(store, uploader, settings, shutdown_rx)
}

fn handle_source(store: &Store, cmd: &SourceCmd) -> Result<()> {
    match cmd {
        SourceCmd::Add {
            name,
            folder,
            pattern,
        } => {
            let id = store.add_source(name, folder, pattern)?;
            println!("added source '{name}' (id {id}) watching {}", folder.display());
        }
        SourceCmd::List => {
            for s in store.list_sources()? {
                let state = match (s.enabled, s.needs_refresh) {
                    (false, _) => "disabled",
                    (true, true) => "enabled, refresh pending",
                    (true, false) => "enabled",
                };
                println!(
                    "{}\t{}\t{}\t[{state}]",
                    s.name,
                    s.folder.display(),
                    s.pattern
                );
            }
        }
        SourceCmd::Enable { name } => {
            if !store.set_source_enabled(name, true)? {
                bail!("no such source: {name}");
            }
            println!("enabled '{name}'");
        }
        SourceCmd::Disable { name } => {
            if !store.set_source_enabled(name, false)? {
                bail!("no such source: {name}");
            }
            println!("disabled '{name}'");
        }
        SourceCmd::Refresh { name } => {
            if !store.flag_refresh(name)? {
                bail!("no such source: {name}");
            }
            println!("flagged '{name}' for refresh");
        }
    }
    Ok(())
}

fn handle_queue(store: &Store, status: Option<&str>, limit: usize) -> Result<()> {
    let status = match status {
        Some(s) => match UploadStatus::parse(s) {
            Some(parsed) => Some(parsed),
            None => bail!("unknown status: {s}"),
        },
        None => None,
    };
    for item in store.list_items(status, limit)? {
        println!(
            "{}\t{}\t{}\t{}\tattempts {}/{}\t{}",
            item.id,
            item.status,
            item.source,
            item.file_name,
            item.attempts,
            item.max_retries,
            item.last_error.as_deref().unwrap_or("-")
        );
    }
    let counts = store.status_counts()?;
    if !counts.is_empty() {
        let summary: Vec<String> = counts
            .iter()
            .map(|(status, n)| format!("{status}: {n}"))
            .collect();
        println!("totals: {}", summary.join(", "));
    }
    Ok(())
}
