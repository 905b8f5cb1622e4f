//! Command-line interface for shelfsync.
//!
//! Provides commands for importing a Steam library, checking the status of
//! an import run, listing past runs, and inspecting configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use uuid::Uuid;

use crate::adapters::{IgdbCatalogClient, SteamClient};
use crate::config;
use crate::core::{grouping_key, normalize, ImportOrchestrator, RunControl, RunLog};
use crate::domain::{EventType, ImportRun, ImportState, UserId};
use crate::library::SqliteLibraryStore;

/// shelfsync - Reconcile a Steam library against the IGDB catalog
#[derive(Parser, Debug)]
#[command(name = "shelfsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a Steam library into a user's owned library
    Import {
        /// Host user receiving the imported titles
        #[arg(short, long)]
        user: UserId,

        /// 64-bit Steam account id
        #[arg(long, env = "STEAM_ID")]
        steam_id: String,

        /// Library database (defaults to $SHELFSYNC_HOME/library.db)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Total run timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Check the status of an import run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// List recent import runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show how a raw title is normalized for matching
    Normalize {
        /// Raw title as reported by the source platform
        name: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Import {
                user,
                steam_id,
                db,
                timeout,
            } => run_import(user, &steam_id, db, timeout).await,
            Commands::Status { run_id } => show_status(&run_id).await,
            Commands::Runs { limit } => list_runs(limit).await,
            Commands::Normalize { name } => {
                show_normalized(&name);
                Ok(())
            }
            Commands::Config => show_config().await,
        }
    }
}

/// Run one import against the live services
async fn run_import(
    user_id: UserId,
    steam_id: &str,
    db: Option<PathBuf>,
    timeout: Option<u64>,
) -> Result<()> {
    let mut limits = config::import_limits()?;
    if let Some(timeout) = timeout {
        limits.run_timeout_seconds = timeout;
    }

    let db_path = match db {
        Some(path) => path,
        None => config::database_path()?,
    };
    let store = SqliteLibraryStore::open(&db_path)?;
    let catalog = IgdbCatalogClient::from_env().context("IGDB client not configured")?;
    let source = SteamClient::from_env().context("Steam client not configured")?;

    let control = RunControl::with_timeout(limits.run_timeout());
    let orchestrator = ImportOrchestrator::new(
        Arc::new(catalog),
        Arc::new(source),
        Arc::new(store),
        limits,
    )
    .with_run_log(config::runs_dir()?);

    // Ctrl-C stops the run at the next remote call; nothing is persisted
    let interrupt = {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling import");
                control.cancel();
            }
        })
    };

    let run = orchestrator.run_import(user_id, steam_id, &control).await;
    interrupt.abort();

    print_outcome(&run);
    if run.state != ImportState::Done {
        std::process::exit(1);
    }

    Ok(())
}

fn print_outcome(run: &ImportRun) {
    match run.outcome() {
        Ok(summary) if summary.nothing_to_import => {
            eprintln!("[Run {}: source library is empty, nothing to import]", run.id);
        }
        Ok(summary) => {
            println!("Imported:  {}", summary.imported_count);
            println!("Unmatched: {}", summary.unmatched_total);
            for name in &summary.unmatched_sample {
                println!("  - {}", name);
            }
            if summary.unmatched_total > summary.unmatched_sample.len() {
                println!(
                    "  ... and {} more",
                    summary.unmatched_total - summary.unmatched_sample.len()
                );
            }
            eprintln!("\n[Run {} completed]", run.id);
        }
        Err(failure) => {
            eprintln!("\n[Run {} {}: {}]", run.id, run.state, failure);
        }
    }
}

/// Show the status of a run
async fn show_status(run_id_str: &str) -> Result<()> {
    let run_id =
        Uuid::parse_str(run_id_str).with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let runs_dir = config::runs_dir()?;
    if !runs_dir.join(run_id.to_string()).exists() {
        anyhow::bail!("Run not found: {}", run_id);
    }

    let log = RunLog::open(run_id).await?;
    let run = log
        .load_run()
        .await?
        .with_context(|| format!("Run has no events: {}", run_id))?;

    println!("Run ID:      {}", run.id);
    println!("User:        {}", run.user_id);
    println!("Steam ID:    {}", run.source_user_id);
    println!("State:       {}", run.state);
    println!("Started:     {}", run.started_at);
    if let Some(completed) = run.completed_at {
        println!("Completed:   {}", completed);
    }

    match run.outcome() {
        Ok(summary) => {
            println!("Imported:    {}", summary.imported_count);
            println!("Unmatched:   {}", summary.unmatched_total);
            for name in &summary.unmatched_sample {
                println!("  - {}", name);
            }
        }
        Err(failure) => println!("Failure:     {}", failure),
    }

    let db_path = config::database_path()?;
    if db_path.exists() {
        let store = SqliteLibraryStore::open(&db_path)?;
        let owned = store.owned_entries(run.user_id).await?;
        println!("Owned now:   {} titles", owned.len());
    }
    println!("Log:         {}", log.events_path().display());

    println!("\nAbsorbed failures:");
    for event_type in [
        EventType::BatchFailed,
        EventType::SearchFailed,
        EventType::AchievementsFailed,
    ] {
        println!(
            "  {:<20} {}",
            format!("{:?}", event_type),
            log.count_events(event_type).await?
        );
    }

    Ok(())
}

/// List recent runs, newest first
async fn list_runs(limit: usize) -> Result<()> {
    let runs_dir = config::runs_dir()?;
    let mut runs = Vec::new();
    for run_id in RunLog::list_runs().await? {
        let log = RunLog::open_in(&runs_dir, run_id).await?;
        match log.load_run().await {
            Ok(Some(run)) => runs.push(run),
            Ok(None) => {}
            Err(e) => warn!(%run_id, error = %e, "Skipping unreadable run log"),
        }
    }

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    println!(
        "{:<38} {:<10} {:<20} {:<10} {:<9}",
        "RUN ID", "USER", "STARTED", "STATE", "IMPORTED"
    );
    println!("{}", "-".repeat(90));

    for run in runs.into_iter().take(limit) {
        println!(
            "{:<38} {:<10} {:<20} {:<10} {:<9}",
            run.id,
            run.user_id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.state,
            run.summary.imported_count
        );
    }

    Ok(())
}

fn show_normalized(name: &str) {
    let cleaned = normalize(name);
    if cleaned.is_empty() {
        println!("(blank - would be reported as unmatched)");
    } else {
        println!("Normalized: {}", cleaned);
        println!("Key:        {}", grouping_key(&cleaned));
    }
}

async fn show_config() -> Result<()> {
    let cfg = config::config()?;
    let limits = &cfg.limits;

    println!("shelfsync configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Database: {}", cfg.database.display());
    println!("  Runs:     {}", cfg.runs_dir().display());
    println!();
    println!("Import limits:");
    println!("  Batch size:        {}", limits.batch_size);
    println!("  Batch delay:       {}ms", limits.batch_delay_ms);
    println!("  Search delay:      {}ms", limits.search_delay_ms);
    println!("  Search window:     {}", limits.search_window);
    println!("  Unmatched sample:  {}", limits.unmatched_sample_size);
    println!("  Timeout:           {}s", limits.run_timeout_seconds);
    println!("  Tie break:         {:?}", limits.tie_break);
    println!();
    println!("Credentials:");
    for var in ["TWITCH_CLIENT_ID", "TWITCH_CLIENT_SECRET", "STEAM_API_KEY"] {
        let state = if std::env::var(var).is_ok() { "set" } else { "missing" };
        println!("  {:<21} {}", var, state);
    }

    Ok(())
}
