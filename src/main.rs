//! ticklerd entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tickler::adapters::bus::{BusConfig, InMemoryEventBus};
use tickler::adapters::sqlite::{
    initialize_database, PoolConfig, SqliteConversationLog, SqliteTaskRepository,
};
use tickler::domain::models::Config;
use tickler::services::subscriptions;
use tickler::{
    ConfigLoader, ReminderDeliveryHandler, ReminderScanner, TaskCompletionHandler,
    REMINDERS_TOPIC, TASK_EVENTS_TOPIC,
};

#[derive(Parser)]
#[command(name = "ticklerd", about = "Recurring-task and reminder engine", version)]
struct Cli {
    /// Path to a config file (defaults to .tickler/config.yaml + env)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine: scanner loop plus both event handlers
    Run,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the (topic, route) subscription pairs as JSON
    Subscriptions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::Subscriptions => {
            println!("{}", serde_json::to_string_pretty(&subscriptions())?);
            Ok(())
        }
    }
}

async fn migrate(config: Config) -> anyhow::Result<()> {
    let pool = initialize_database(&config.database.url, Some(pool_config(&config)))
        .await
        .context("database initialization failed")?;
    pool.close().await;
    tracing::info!("migrations applied");
    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let pool = initialize_database(&config.database.url, Some(pool_config(&config)))
        .await
        .context("database initialization failed")?;

    let repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let sink = Arc::new(SqliteConversationLog::new(pool.clone()));
    let bus = Arc::new(InMemoryEventBus::new(BusConfig::default()));

    for sub in subscriptions() {
        tracing::info!(topic = sub.topic, route = sub.route, "subscription declared");
    }

    let completion = Arc::new(TaskCompletionHandler::new(repo.clone()));
    let delivery = Arc::new(ReminderDeliveryHandler::new(sink));
    let consumers = vec![
        bus.attach(TASK_EVENTS_TOPIC, completion).await,
        bus.attach(REMINDERS_TOPIC, delivery).await,
    ];

    let scanner = Arc::new(ReminderScanner::new(
        repo,
        bus.clone(),
        config.scanner.interval(),
    ));
    let scanner_handle = scanner.start();

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");

    scanner.stop();
    scanner_handle.abort();
    for consumer in consumers {
        consumer.abort();
    }
    pool.close().await;
    Ok(())
}

fn pool_config(config: &Config) -> PoolConfig {
    PoolConfig {
        max_connections: config.database.max_connections,
        ..Default::default()
    }
}
