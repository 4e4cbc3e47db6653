use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tickler_core::config::{DatabaseConfig, StoreBackend, TicklerConfig};
use tickler_core::time::parse_future_deadline;
use tickler_core::{Clock, SystemClock};
use tickler_reminder::{
    spawn_stdin_reader, ConsoleSink, LineRouter, ReminderEngine, ReminderSettings,
};
use tickler_store::{MemoryTaskStore, SqliteTaskStore, TaskStore};
use tokio::sync::watch;
use tracing::{error, info, warn};

mod menu;

/// Personal task tracker with deadline reminders.
///
/// Without a subcommand, starts the interactive menu with the reminder
/// engine running in the background.
#[derive(Parser)]
#[command(name = "tickler", version, about = "Task tracker with deadline reminders")]
struct Cli {
    /// Config file (default: $TICKLER_CONFIG, then ~/.tickler/tickler.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    /// SQLite database file, overriding the configured one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Keep tasks in memory only.
    #[arg(long, global = true, conflicts_with = "db")]
    memory: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive menu plus background reminders (default).
    Run,
    /// Print every task and exit.
    List,
    /// Add a task and exit.
    Add {
        description: String,
        /// Deadline, e.g. "2030-01-01 10:00".
        #[arg(long)]
        due: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stderr keeps log lines out of the menu on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    // config: --config > TICKLER_CONFIG > ~/.tickler/tickler.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("TICKLER_CONFIG").ok());
    let mut config = TicklerConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({e}), using defaults");
        TicklerConfig::default()
    });
    if let Some(db) = &cli.db {
        config.database.backend = StoreBackend::Sqlite;
        config.database.path = db.display().to_string();
    }
    if cli.memory {
        config.database.backend = StoreBackend::Memory;
    }

    let store = open_store(&config.database)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_session(store, clock, &config).await,
        Command::List => {
            let tasks = store.list_all()?;
            if tasks.is_empty() {
                println!("No tasks yet.");
            }
            for task in tasks {
                println!("{task}");
            }
            Ok(())
        }
        Command::Add { description, due } => {
            let deadline = parse_future_deadline(&due, clock.now())
                .map_err(|_| anyhow::anyhow!("Invalid or past deadline: {due}"))?;
            let task = store.insert(&description, deadline)?;
            println!("Task added: {task}");
            Ok(())
        }
    }
}

fn open_store(db: &DatabaseConfig) -> anyhow::Result<Arc<dyn TaskStore>> {
    match db.backend {
        StoreBackend::Memory => {
            info!("using in-memory task store");
            Ok(Arc::new(MemoryTaskStore::new()))
        }
        StoreBackend::Sqlite => {
            ensure_parent_dir(&db.path);
            let store = SqliteTaskStore::open(&db.path)
                .with_context(|| format!("opening task database {}", db.path))?;
            Ok(Arc::new(store))
        }
    }
}

/// Menu in the foreground, reminder engine in the background.
///
/// Ends on menu exit, end of input or Ctrl-C. An engine failure ends the
/// session with an error.
async fn run_session(
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    config: &TicklerConfig,
) -> anyhow::Result<()> {
    let source = spawn_stdin_reader().context("starting stdin reader")?;
    let (router, menu_lines) = LineRouter::spawn(source, Box::new(std::io::stdout()));

    let engine = ReminderEngine::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        Arc::new(ConsoleSink),
        router,
        ReminderSettings::from(&config.reminder),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut engine_task = tokio::spawn(engine.run(shutdown_rx));

    let mut menu = menu::Menu::new(store, clock, menu_lines, std::io::stdout());

    let outcome = tokio::select! {
        res = menu.run() => res,
        res = &mut engine_task => {
            return match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("reminder engine stopped: {e}");
                    Err(e).context("reminder engine failed")
                }
                Err(e) => Err(e).context("reminder engine panicked"),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(true);
    match engine_task.await {
        Ok(Err(e)) => warn!("reminder engine stopped with error: {e}"),
        Err(e) => warn!("reminder engine task failed: {e}"),
        Ok(Ok(())) => {}
    }
    outcome
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
