pub mod clock;
pub mod db;
pub mod detection;
pub mod events;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod posture;
pub mod session;
pub mod settings;
pub mod stats;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{info, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use clock::SystemClock;
use db::{Database, User};
use detection::{MonitorController, StopOutcome};
use events::{AppEvent, EventBus};
use model::ReplayEstimator;
use notify::Notifier;
use settings::SettingsStore;
use stats::ProgressReport;

#[derive(Parser, Debug)]
#[command(name = "posturewatch", version, about = "Sitting-posture monitor")]
pub struct Cli {
    /// Directory holding the database and settings.json
    #[arg(long, default_value = ".posturewatch")]
    pub data_dir: PathBuf,

    /// Recorded estimator output to monitor (JSON lines, `null` = nobody in view)
    #[arg(long)]
    pub replay: PathBuf,

    /// Sign in as this user; registered on first use
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, default_value = "")]
    pub password: String,

    /// Override the detection interval from settings.json
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Store a new weekly good-posture goal for the signed-in user
    #[arg(long)]
    pub weekly_goal: Option<f64>,
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    log::info!("PostureWatch starting up...");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(monitor(cli))
}

async fn monitor(cli: Cli) -> Result<()> {
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("failed to create data dir {}", cli.data_dir.display()))?;

    let database = Database::new(cli.data_dir.join("posturewatch.sqlite3"))?;
    let settings = SettingsStore::new(cli.data_dir.join("settings.json"))?;

    let mut config = settings.detection();
    if let Some(interval_ms) = cli.interval_ms {
        config.frame_interval_ms = interval_ms;
    }

    let user = sign_in(&database, cli.user.as_deref(), &cli.password).await?;
    if let (Some(user), Some(goal)) = (&user, cli.weekly_goal) {
        database.set_weekly_goal(&user.id, goal).await?;
    }

    let events = EventBus::new();
    let printer = spawn_event_printer(&events);

    let exhausted = CancellationToken::new();
    let estimator = ReplayEstimator::from_path(&cli.replay, exhausted.clone())?;

    let controller = MonitorController::new(
        config,
        Arc::new(SystemClock),
        Arc::new(estimator),
        Notifier::with_defaults(events.clone()),
        database.clone(),
        events,
    );
    controller.set_user(user.clone()).await;
    controller.start().await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("Interrupted; stopping monitor");
        }
        _ = exhausted.cancelled() => {
            info!("Replay finished; stopping monitor");
        }
    }

    match controller.stop().await? {
        StopOutcome::Saved { stats, .. } => {
            info!("Session saved ({} total)", stats.total_sessions)
        }
        StopOutcome::TooShort { elapsed_ms } => {
            info!("Session not saved: only {elapsed_ms}ms long")
        }
        StopOutcome::NoUser(_) => warn!("Session not saved: nobody signed in"),
        StopOutcome::NotRunning => {}
    }

    let metrics = controller.metrics().snapshot().await;
    info!(
        "Detection cycles: {} ({} empty, {} failed), avg inference {:.1}ms, cpu {:.1}%, mem {:.1}MB",
        metrics.cycle_count,
        metrics.no_signal_count,
        metrics.failure_count,
        metrics.avg_inference_ms,
        metrics.system.cpu_percent,
        metrics.system.memory_mb
    );

    if let Some(user) = user {
        let stats = database.load_stats(&user.id).await?;
        let report = ProgressReport::build(stats, Local::now());
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    printer.abort();
    Ok(())
}

/// Resolves the identity sessions are saved under. A wrong password runs the
/// monitor signed out rather than failing.
async fn sign_in(database: &Database, username: Option<&str>, password: &str) -> Result<Option<User>> {
    let Some(username) = username else {
        return Ok(None);
    };

    if let Some(user) = database.authenticate(username, password).await? {
        info!("Signed in as {}", user.username);
        return Ok(Some(user));
    }

    if database.find_user(username).await?.is_some() {
        warn!("Wrong password for {username}; running signed out");
        return Ok(None);
    }

    let user = database.register_user(username, password).await?;
    info!("Registered new user {}", user.username);
    Ok(Some(user))
}

/// Stand-in for the UI: one JSON object per event on stdout. Subscribes before
/// returning so events emitted right after (session-started) are not lost.
fn spawn_event_printer(events: &EventBus) -> JoinHandle<()> {
    tokio::spawn(print_events(events.subscribe()))
}

async fn print_events(mut receiver: broadcast::Receiver<AppEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!("failed to serialize event: {err}"),
            },
            Err(RecvError::Lagged(skipped)) => warn!("event printer skipped {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
