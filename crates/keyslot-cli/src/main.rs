//! `keyslot`: run the reconciliation engine, evaluate a policy or inspect
//! stored slots.

mod config;
mod store;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use config::AppConfig;
use keyslot_core::{
    Clock, LockId, PolicyDocument, PolicySettings, SystemClock, Verdict, evaluate,
};
use keyslot_engine::LockRegistry;
use keyslot_link::LogNotifier;
use keyslot_link::mock::MockLockLink;
use keyslot_storage::{Database, SlotRepository, SqliteSlotRepository};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::SqliteStore;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "keyslot", version, about = "Lock code slot policy engine")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage every configured lock until Ctrl-C.
    Run {
        #[arg(long)]
        config: PathBuf,
    },

    /// Evaluate a policy document and print the verdict.
    Evaluate {
        /// JSON policy document
        #[arg(long)]
        settings: PathBuf,

        /// Times the code has been used so far
        #[arg(long, default_value_t = 0)]
        usage: u32,

        /// Local date-time to evaluate at, e.g. 2025-03-03T09:30; defaults to now
        #[arg(long, value_parser = parse_at)]
        at: Option<NaiveDateTime>,
    },

    /// Print the stored slot records of one lock.
    Slots {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        lock: LockId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Run { config } => {
            init_tracing();
            run(&config).await
        }
        Commands::Evaluate {
            settings,
            usage,
            at,
        } => {
            let now = at.unwrap_or_else(|| SystemClock.now());
            let text = evaluate_file(&settings, usage, now)?;
            println!("{text}");
            Ok(())
        }
        Commands::Slots { config, lock } => slots(&config, &lock).await,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn run(path: &Path) -> Result<()> {
    let config = AppConfig::load(path)?;

    let db = Database::new(config.database.clone())
        .await
        .context("failed to open database")?;
    let store = Arc::new(SqliteStore::new(SqliteSlotRepository::new(db.pool().clone())));

    // Emulated locks: codes written by the engine stay put until the process exits.
    let (link, _handle) = MockLockLink::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = LockRegistry::new(
        config.engine.clone(),
        Arc::new(link),
        Arc::new(LogNotifier::new(config.notify_target.clone())),
        store,
        clock,
    );

    if config.locks.is_empty() {
        warn!(config = %path.display(), "No locks configured");
    }

    for lock in config.locks {
        let lock_id = lock.lock_id.clone();
        registry
            .load(lock)
            .await
            .with_context(|| format!("failed to load lock {lock_id}"))?;
    }

    let loaded = registry.lock_ids().await.len();
    info!(locks = loaded, "keyslot running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("Shutting down");
    let unloaded = registry.unload_all().await;
    db.close().await;
    unloaded.context("failed to unload locks cleanly")
}

fn evaluate_file(path: &Path, usage: u32, now: NaiveDateTime) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let document: PolicyDocument = serde_json::from_str(&text)
        .with_context(|| format!("invalid settings file {}", path.display()))?;
    let settings = PolicySettings::try_from(document).context("invalid policy")?;

    Ok(render_evaluation(&settings, usage, now))
}

fn render_evaluation(settings: &PolicySettings, usage: u32, now: NaiveDateTime) -> String {
    let evaluation = evaluate(Some(settings), usage, now);
    let verdict = match evaluation.verdict {
        Verdict::Enabled => "enabled",
        Verdict::Disabled => "disabled",
    };

    format!(
        "at:      {}\nverdict: {verdict}\nreason:  {} ({})",
        now.format("%Y-%m-%d %H:%M:%S %A"),
        evaluation.reason.code(),
        evaluation.reason.description(),
    )
}

async fn slots(path: &Path, lock: &LockId) -> Result<()> {
    let config = AppConfig::load(path)?;
    let db = Database::new(config.database)
        .await
        .context("failed to open database")?;
    let repository = SqliteSlotRepository::new(db.pool().clone());

    let records = repository
        .find_by_lock(lock)
        .await
        .with_context(|| format!("failed to read slots of {lock}"))?;
    db.close().await;

    if records.is_empty() {
        println!("No stored slots for {lock}");
        return Ok(());
    }

    println!("{:>5}  {:<9} {:>5}  {:<4}  {:<8}  user", "slot", "state", "uses", "code", "enabled");
    for record in &records {
        let (enabled, user) = record
            .settings
            .as_ref()
            .map_or(("-", ""), |s| (if s.enabled() { "yes" } else { "no" }, s.user_name()));
        println!(
            "{:>5}  {:<9} {:>5}  {:<4}  {:<8}  {}",
            record.slot_index,
            record.state.to_string(),
            record.usage_count,
            if record.desired_code.is_some() { "set" } else { "-" },
            enabled,
            user,
        );
    }
    Ok(())
}

fn parse_at(value: &str) -> std::result::Result<NaiveDateTime, String> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM[:SS], got {value:?}"))
}
