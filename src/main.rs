//! Activation-core CLI entry point.
//!
//! Loads configuration, brings up persistence and logging, wires the
//! EventBus/IntentMatcher/CooldownGuard/BotLifecycleManager/ActivationRouter/
//! HeartbeatMonitor/PulseRunner graph for every configured bot, then either
//! runs the requested one-shot CLI command or sits as a long-lived daemon.

use std::sync::Arc;

use activation_core::cli::{commands, BotsCommands, Cli, Commands};
use activation_core::domain::models::BotConfig;
use activation_core::domain::ports::{BotExecutor, ExecutionOutcome};
use activation_core::infrastructure::config::ConfigLoader;
use activation_core::infrastructure::database::{DatabaseConnection, SqlitePersistence};
use activation_core::infrastructure::logging::LoggerImpl;
use activation_core::services::{
    ActivationRouter, BotLifecycleManager, CooldownGuard, EventBus, HeartbeatMonitor,
    IntentMatcher, NoUsers, PulseRunner,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use serde_json::json;

/// Placeholder executor: the LLM-driven bot body is out of scope for this
/// crate (§1). Wire a real implementation here to run actual bots; for now
/// every run reports success immediately so the activation graph above it
/// is fully exercised end to end.
struct StubExecutor;

#[async_trait]
impl BotExecutor for StubExecutor {
    async fn execute(&self, cfg: &BotConfig, trigger: &str, _context: Option<&str>) -> ExecutionOutcome {
        tracing::warn!(
            bot_name = %cfg.name,
            trigger,
            "no executor configured, reporting stub success"
        );
        ExecutionOutcome {
            ok: true,
            output: "stub executor: no-op".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cost_cents: 0,
            error: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        std::env::set_var("ACTIVATION_CONFIG_PATH", path);
    }
    let config = ConfigLoader::load().context("failed to load configuration")?;

    let _logger = LoggerImpl::init(&config.logging).context("failed to initialize logging")?;

    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::new(&database_url, config.database.max_connections)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run database migrations")?;

    let persistence = Arc::new(SqlitePersistence::new(db.pool().clone()));
    let bus = Arc::new(EventBus::new());
    let cooldown = Arc::new(CooldownGuard::new());
    let matcher = Arc::new(IntentMatcher::new());
    let lifecycle = Arc::new(BotLifecycleManager::new(
        Arc::new(StubExecutor),
        persistence.clone(),
        bus.clone(),
        cooldown.clone(),
    ));
    let router = Arc::new(ActivationRouter::new(
        matcher.clone(),
        cooldown.clone(),
        lifecycle.clone(),
        bus.clone(),
    ));
    let heartbeat = Arc::new(HeartbeatMonitor::new(bus.clone(), lifecycle.clone()));
    let pulse = Arc::new(PulseRunner::new(Arc::new(NoopPulseHandler), Arc::new(NoUsers)));

    for (name, mut bot) in config.bots.clone() {
        bot.name = name.clone();
        if bot.display_name.is_empty() {
            bot.display_name = name.clone();
        }
        lifecycle.register(bot.clone()).await;
        persist_with_retry_log(
            persistence
                .upsert_bot_record(&name, &bot.display_name, &json!({"enabled": bot.enabled}))
                .await,
        );
    }

    lifecycle.initialize(router.clone(), heartbeat.clone(), pulse.clone()).await;
    let heartbeat_task = bus.spawn_heartbeat();

    let result = run_command(cli, &lifecycle, &bus).await;

    lifecycle.shutdown().await;
    heartbeat_task.abort();
    db.close().await;

    result
}

async fn run_command(cli: Cli, lifecycle: &BotLifecycleManager, bus: &EventBus) -> Result<()> {
    match cli.command {
        Commands::Bots(BotsCommands::List) => commands::bots_list(lifecycle).await,
        Commands::Bots(BotsCommands::Show { name }) => commands::bots_show(lifecycle, &name).await,
        Commands::Events { json, count } => commands::events_tail(bus, json, count).await,
        Commands::Run { bot } => commands::run_bot(lifecycle, &bot).await,
    }
    Ok(())
}

fn persist_with_retry_log(result: Result<(), activation_core::domain::PersistenceError>) {
    if let Err(err) = result {
        tracing::warn!(%err, "failed to seed bot record at startup");
    }
}

struct NoopPulseHandler;

#[async_trait]
impl activation_core::services::PulseHandler for NoopPulseHandler {
    async fn run_pulse(&self, _bot_name: &str, _user_id: &str) -> Result<(), activation_core::domain::PulseError> {
        Ok(())
    }
}
