//! BotLifecycleManager: the state machine and run tracking for every
//! configured bot (§4.4).
//!
//! Bots are event-driven rather than polled: the activation router decides
//! *when* to call `start_bot`, this manager enforces *whether* it's allowed
//! to run right now and tracks the result.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::error::ActivationError;
use crate::domain::models::{BotConfig, BotState, BotStatus};
use crate::domain::ports::{BotExecutor, ExecutionOutcome, PersistencePort};
use crate::services::activation_router::ActivationRouter;
use crate::services::cooldown_guard::CooldownGuard;
use crate::services::event_bus::EventBus;
use crate::services::heartbeat_monitor::HeartbeatMonitor;
use crate::services::pulse_runner::PulseRunner;
use crate::services::retry::persist_with_retry;

struct Tracked {
    configs: HashMap<String, BotConfig>,
    states: HashMap<String, BotState>,
    active_runs: HashMap<String, JoinHandle<()>>,
    paused: HashSet<String>,
    /// Bots registered via `create_custom_bot` rather than from static
    /// config; only these may be removed by `delete_custom_bot`.
    custom: HashSet<String>,
}

/// The activation router/heartbeat monitor/pulse runner this manager
/// coordinates, wired in by `initialize`. Runtime-created bots (via
/// `create_custom_bot`) are registered with these the same way `initialize`
/// registers the statically configured ones.
struct Collaborators {
    router: Arc<ActivationRouter>,
    heartbeat: Arc<HeartbeatMonitor>,
    pulse: Arc<PulseRunner>,
}

/// Orchestrates bot lifecycle: starts/stops/pauses runs, tracks state, and
/// enforces at-most-one-concurrent-run-per-bot plus the configured timeout.
pub struct BotLifecycleManager {
    tracked: Arc<Mutex<Tracked>>,
    run_lock: Mutex<()>,
    executor: Arc<dyn BotExecutor>,
    persistence: Arc<dyn PersistencePort>,
    bus: Arc<EventBus>,
    cooldown: Arc<CooldownGuard>,
    initialized: AtomicBool,
    collaborators: Mutex<Option<Collaborators>>,
}

impl BotLifecycleManager {
    #[must_use]
    pub fn new(
        executor: Arc<dyn BotExecutor>,
        persistence: Arc<dyn PersistencePort>,
        bus: Arc<EventBus>,
        cooldown: Arc<CooldownGuard>,
    ) -> Self {
        Self {
            tracked: Arc::new(Mutex::new(Tracked {
                configs: HashMap::new(),
                states: HashMap::new(),
                active_runs: HashMap::new(),
                paused: HashSet::new(),
                custom: HashSet::new(),
            })),
            run_lock: Mutex::new(()),
            executor,
            persistence,
            bus,
            cooldown,
            initialized: AtomicBool::new(false),
            collaborators: Mutex::new(None),
        }
    }

    /// Register a configured bot, seeding its lifecycle state.
    pub async fn register(&self, cfg: BotConfig) {
        let mut tracked = self.tracked.lock().await;
        let state = BotState::new(cfg.name.clone(), cfg.enabled);
        tracked.states.insert(cfg.name.clone(), state);
        tracked.configs.insert(cfg.name.clone(), cfg);
    }

    /// Wire the router/heartbeat/pulse graph for every bot already
    /// `register`ed, start all three, and publish the initial `bots_state`
    /// snapshot. `start_bot` rejects with `not_initialized` until this has
    /// run.
    pub async fn initialize(
        &self,
        router: Arc<ActivationRouter>,
        heartbeat: Arc<HeartbeatMonitor>,
        pulse: Arc<PulseRunner>,
    ) {
        let bots: Vec<BotConfig> = self.tracked.lock().await.configs.values().cloned().collect();
        for bot in &bots {
            router.register(bot.clone()).await;
            heartbeat.configure(&bot.name, bot.heartbeat_hours).await;
            if bot.pulse.enabled {
                pulse
                    .configure(&bot.name, bot.pulse.active_hours_start, bot.pulse.active_hours_end)
                    .await;
            }
        }

        router.start().await;
        heartbeat.start().await;
        pulse.start().await;

        *self.collaborators.lock().await = Some(Collaborators { router, heartbeat, pulse });
        self.initialized.store(true, Ordering::SeqCst);

        self.publish_bots_state().await;
        info!(bot_count = bots.len(), "bot lifecycle manager initialized");
    }

    /// Register a bot at runtime (not from static config), wiring it into
    /// the router/heartbeat/pulse graph the same way `initialize` wires a
    /// configured one. Marks it `custom` so `delete_custom_bot` may later
    /// remove it.
    pub async fn create_custom_bot(&self, mut cfg: BotConfig) -> Result<(), ActivationError> {
        if cfg.display_name.is_empty() {
            cfg.display_name = cfg.name.clone();
        }

        {
            let mut tracked = self.tracked.lock().await;
            if tracked.configs.contains_key(&cfg.name) {
                return Err(ActivationError::AlreadyExists(cfg.name));
            }
            let state = BotState::new(cfg.name.clone(), cfg.enabled);
            tracked.states.insert(cfg.name.clone(), state);
            tracked.configs.insert(cfg.name.clone(), cfg.clone());
            tracked.custom.insert(cfg.name.clone());
        }

        if let Some(collab) = self.collaborators.lock().await.as_ref() {
            collab.router.register(cfg.clone()).await;
            collab.heartbeat.configure(&cfg.name, cfg.heartbeat_hours).await;
            if cfg.pulse.enabled {
                collab
                    .pulse
                    .configure(&cfg.name, cfg.pulse.active_hours_start, cfg.pulse.active_hours_end)
                    .await;
            }
        }

        let payload = serde_json::json!({"enabled": cfg.enabled});
        persist_with_retry("upsert_bot_record", || {
            self.persistence.upsert_bot_record(&cfg.name, &cfg.display_name, &payload)
        })
        .await;

        self.publish_bots_state().await;
        info!(bot_name = %cfg.name, "custom bot created");
        Ok(())
    }

    /// Remove a bot created via `create_custom_bot`. Bots seeded from static
    /// config (`register`) can never be deleted this way.
    pub async fn delete_custom_bot(&self, bot_name: &str) -> Result<(), ActivationError> {
        {
            let tracked = self.tracked.lock().await;
            if !tracked.configs.contains_key(bot_name) {
                return Err(ActivationError::NotFound(bot_name.to_string()));
            }
            if !tracked.custom.contains(bot_name) {
                return Err(ActivationError::IsBuiltin(bot_name.to_string()));
            }
        }

        self.stop_bot(bot_name).await;

        if let Some(collab) = self.collaborators.lock().await.as_ref() {
            collab.router.unregister(bot_name).await;
        }

        {
            let mut tracked = self.tracked.lock().await;
            tracked.configs.remove(bot_name);
            tracked.states.remove(bot_name);
            tracked.paused.remove(bot_name);
            tracked.custom.remove(bot_name);
        }

        self.publish_bots_state().await;
        info!(bot_name, "custom bot deleted");
        Ok(())
    }

    /// Publish an arbitrary event onto the bus; the activation router, if
    /// running, picks it up downstream exactly like any other event.
    pub async fn handle_event(&self, event_type: &str, context: Option<HashMap<String, serde_json::Value>>) {
        let mut event = crate::domain::models::Event::new(event_type);
        if let Some(fields) = context {
            for (key, value) in fields {
                event = event.with_field(key, value);
            }
        }
        self.bus.publish(event).await;
    }

    async fn publish_bots_state(&self) {
        let states = self.get_all_states().await;
        self.bus
            .publish(
                crate::domain::models::Event::new("bots_state")
                    .with_field("bots", serde_json::to_value(states).unwrap_or_default()),
            )
            .await;
    }

    /// Start a bot run. Returns immediately once the run task is spawned; the
    /// run itself proceeds in the background.
    pub async fn start_bot(
        &self,
        bot_name: &str,
        trigger_type: &str,
        context: Option<String>,
    ) -> Result<(), ActivationError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(ActivationError::NotInitialized);
        }

        let cfg = {
            let tracked = self.tracked.lock().await;
            if tracked.paused.contains(bot_name) {
                return Err(ActivationError::BotPaused(bot_name.to_string()));
            }
            let cfg = tracked
                .configs
                .get(bot_name)
                .cloned()
                .ok_or_else(|| ActivationError::UnknownBot(bot_name.to_string()))?;
            if !cfg.enabled {
                return Err(ActivationError::BotDisabled(bot_name.to_string()));
            }
            cfg
        };

        // The run lock serializes the check-then-spawn sequence so a
        // concurrent manual trigger and router activation can't both pass
        // the "not already running" check.
        let _guard = self.run_lock.lock().await;
        {
            let tracked = self.tracked.lock().await;
            if tracked
                .active_runs
                .get(bot_name)
                .is_some_and(|h| !h.is_finished())
            {
                return Err(ActivationError::AlreadyRunning(bot_name.to_string()));
            }
        }

        let run_id = Uuid::new_v4().to_string();
        let handle = self.spawn_run(cfg.clone(), run_id, trigger_type.to_string(), context);

        let mut tracked = self.tracked.lock().await;
        tracked.active_runs.insert(bot_name.to_string(), handle);
        if let Some(state) = tracked.states.get_mut(bot_name) {
            state.status = BotStatus::Running;
            state.last_activated_by = Some(trigger_type.to_string());
        }
        drop(tracked);

        self.bus
            .publish(
                crate::domain::models::Event::new("bot_state_change")
                    .with_field("bot_name", bot_name)
                    .with_field("status", "running")
                    .with_field("trigger_type", trigger_type),
            )
            .await;

        Ok(())
    }

    fn spawn_run(
        &self,
        cfg: BotConfig,
        run_id: String,
        trigger_type: String,
        context: Option<String>,
    ) -> JoinHandle<()> {
        let executor = self.executor.clone();
        let persistence = self.persistence.clone();
        let bus = self.bus.clone();
        let cooldown = self.cooldown.clone();
        let tracked = self.tracked.clone();
        let bot_name = cfg.name.clone();

        tokio::spawn(async move {
            let started_at = Utc::now();
            persist_with_retry("create_bot_run", || {
                persistence.create_bot_run(&run_id, &bot_name, &trigger_type, started_at)
            })
            .await;

            bus.publish(
                crate::domain::models::Event::new("bot_run_start")
                    .with_field("bot_name", &bot_name)
                    .with_field("run_id", &run_id)
                    .with_field("trigger_type", &trigger_type),
            )
            .await;

            let timeout_secs = u64::from(cfg.timeout_minutes) * 60;
            let outcome = timeout(
                Duration::from_secs(timeout_secs),
                executor.execute(&cfg, &trigger_type, context.as_deref()),
            )
            .await;

            let (status, summary): (BotStatus, ExecutionOutcome) = match outcome {
                Ok(result) if result.ok => (BotStatus::Waiting, result),
                Ok(result) => (BotStatus::Errored, result),
                Err(_) => {
                    error!(bot_name, run_id, minutes = cfg.timeout_minutes, "bot run timed out");
                    (
                        BotStatus::Errored,
                        ExecutionOutcome {
                            ok: false,
                            output: String::new(),
                            input_tokens: 0,
                            output_tokens: 0,
                            cost_cents: 0,
                            error: Some(format!("Timed out after {} minutes", cfg.timeout_minutes)),
                        },
                    )
                }
            };

            let run_status = if status == BotStatus::Waiting { "completed" } else { "errored" };
            persist_with_retry("complete_bot_run", || {
                persistence.complete_bot_run(
                    &run_id,
                    run_status,
                    &summary.output,
                    summary.input_tokens,
                    summary.output_tokens,
                    summary.cost_cents,
                )
            })
            .await;

            if status == BotStatus::Errored {
                if let Some(ref err) = summary.error {
                    bus.publish(
                        crate::domain::models::Event::new("bot_run_error")
                            .with_field("bot_name", &bot_name)
                            .with_field("run_id", &run_id)
                            .with_field("error", err.as_str()),
                    )
                    .await;
                }
            }

            let mut t = tracked.lock().await;
            if let Some(state) = t.states.get_mut(&bot_name) {
                state.status = status;
                if status == BotStatus::Waiting {
                    state.last_run_at = Some(Utc::now());
                    state.total_runs += 1;
                }
            }
            let cooldown_minutes = t
                .configs
                .get(&bot_name)
                .map(|c| c.intent.cooldown_minutes)
                .unwrap_or(0);
            t.active_runs.remove(&bot_name);
            drop(t);

            let cooldown_until = cooldown.cooldown_until(&bot_name, cooldown_minutes).await;
            let runs_today = cooldown.daily_count(&bot_name).await;

            bus.publish(
                crate::domain::models::Event::new("bot_state_change")
                    .with_field("bot_name", &bot_name)
                    .with_field(
                        "status",
                        if status == BotStatus::Waiting { "waiting" } else { "errored" },
                    )
                    .with_field("runs_today", runs_today)
                    .with_field(
                        "cooldown_until",
                        cooldown_until.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    ),
            )
            .await;
        })
    }

    pub async fn stop_bot(&self, bot_name: &str) {
        let handle = {
            let mut tracked = self.tracked.lock().await;
            tracked.active_runs.remove(bot_name)
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        let mut tracked = self.tracked.lock().await;
        tracked.paused.insert(bot_name.to_string());
        if let Some(state) = tracked.states.get_mut(bot_name) {
            state.status = BotStatus::Stopped;
        }
        drop(tracked);
        self.bus
            .publish(
                crate::domain::models::Event::new("bot_state_change")
                    .with_field("bot_name", bot_name)
                    .with_field("status", "stopped"),
            )
            .await;
    }

    pub async fn pause_bot(&self, bot_name: &str) {
        let mut tracked = self.tracked.lock().await;
        tracked.paused.insert(bot_name.to_string());
        let still_running = tracked.active_runs.get(bot_name).is_some_and(|h| !h.is_finished());
        if !still_running {
            if let Some(state) = tracked.states.get_mut(bot_name) {
                state.status = BotStatus::Paused;
            }
        }
        drop(tracked);
        self.bus
            .publish(
                crate::domain::models::Event::new("bot_state_change")
                    .with_field("bot_name", bot_name)
                    .with_field("status", "paused"),
            )
            .await;
    }

    pub async fn resume_bot(&self, bot_name: &str) {
        let mut tracked = self.tracked.lock().await;
        tracked.paused.remove(bot_name);
        let still_running = tracked.active_runs.get(bot_name).is_some_and(|h| !h.is_finished());
        if !still_running {
            if let Some(state) = tracked.states.get_mut(bot_name) {
                state.status = BotStatus::Waiting;
            }
        }
        drop(tracked);
        self.bus
            .publish(
                crate::domain::models::Event::new("bot_state_change")
                    .with_field("bot_name", bot_name)
                    .with_field("status", "waiting"),
            )
            .await;
    }

    pub async fn set_enabled(&self, bot_name: &str, enabled: bool) {
        if !enabled {
            self.stop_bot(bot_name).await;
        }
        let mut tracked = self.tracked.lock().await;
        if enabled {
            tracked.paused.remove(bot_name);
        }
        if let Some(cfg) = tracked.configs.get_mut(bot_name) {
            cfg.enabled = enabled;
        }
        if let Some(state) = tracked.states.get_mut(bot_name) {
            state.enabled = enabled;
            state.status = if enabled { BotStatus::Waiting } else { BotStatus::Disabled };
        }
        drop(tracked);
        self.bus
            .publish(
                crate::domain::models::Event::new("bot_state_change")
                    .with_field("bot_name", bot_name)
                    .with_field("enabled", enabled),
            )
            .await;
    }

    pub async fn is_running(&self, bot_name: &str) -> bool {
        self.tracked
            .lock()
            .await
            .active_runs
            .get(bot_name)
            .is_some_and(|h| !h.is_finished())
    }

    pub async fn running_count(&self) -> usize {
        self.tracked
            .lock()
            .await
            .active_runs
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub async fn get_bot_state(&self, bot_name: &str) -> Option<BotState> {
        self.tracked.lock().await.states.get(bot_name).cloned()
    }

    pub async fn get_all_states(&self) -> Vec<BotState> {
        self.tracked.lock().await.states.values().cloned().collect()
    }

    /// Cancel every active run, wait for them to finish unwinding, then stop
    /// the router/heartbeat/pulse graph wired in by `initialize`.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tracked = self.tracked.lock().await;
            tracked.active_runs.drain().map(|(_, h)| h).collect()
        };
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }

        if let Some(collab) = self.collaborators.lock().await.take() {
            collab.router.stop().await;
            collab.heartbeat.stop().await;
            collab.pulse.stop().await;
        }

        info!("bot lifecycle manager shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::PersistenceError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedExecutor {
        ok: bool,
        runs: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BotExecutor for ScriptedExecutor {
        async fn execute(&self, _cfg: &BotConfig, _trigger: &str, _context: Option<&str>) -> ExecutionOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            ExecutionOutcome {
                ok: self.ok,
                output: "out".to_string(),
                input_tokens: 10,
                output_tokens: 20,
                cost_cents: 1,
                error: if self.ok { None } else { Some("runtime error".to_string()) },
            }
        }
    }

    struct NullPersistence;

    #[async_trait]
    impl PersistencePort for NullPersistence {
        async fn create_bot_run(&self, _: &str, _: &str, _: &str, _: chrono::DateTime<Utc>) -> Result<(), PersistenceError> {
            Ok(())
        }
        async fn complete_bot_run(&self, _: &str, _: &str, _: &str, _: u64, _: u64, _: u64) -> Result<(), PersistenceError> {
            Ok(())
        }
        async fn create_bot_log(&self, _: &str, _: &str, _: &str, _: &str, _: Option<Value>) -> Result<(), PersistenceError> {
            Ok(())
        }
        async fn upsert_bot_record(&self, _: &str, _: &str, _: &Value) -> Result<(), PersistenceError> {
            Ok(())
        }
        async fn update_bot_state(&self, _: &str, _: &str, _: Option<chrono::DateTime<Utc>>) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    fn make_manager(ok: bool, runs: Arc<AtomicU32>) -> Arc<BotLifecycleManager> {
        Arc::new(BotLifecycleManager::new(
            Arc::new(ScriptedExecutor { ok, runs }),
            Arc::new(NullPersistence),
            Arc::new(EventBus::new()),
            Arc::new(CooldownGuard::new()),
        ))
    }

    struct NoopPulseHandler;

    #[async_trait]
    impl crate::services::pulse_runner::PulseHandler for NoopPulseHandler {
        async fn run_pulse(&self, _bot_name: &str, _user_id: &str) -> Result<(), crate::domain::error::PulseError> {
            Ok(())
        }
    }

    /// Wires a throwaway router/heartbeat/pulse graph and calls
    /// `initialize`, so `start_bot` is no longer rejected as
    /// `not_initialized`. The collaborators themselves are never started.
    async fn initialize(manager: &Arc<BotLifecycleManager>) {
        let bus = Arc::new(EventBus::new());
        let matcher = Arc::new(crate::services::intent_matcher::IntentMatcher::new());
        let cooldown = Arc::new(CooldownGuard::new());
        let router = Arc::new(ActivationRouter::new(matcher, cooldown, manager.clone(), bus.clone()));
        let heartbeat = Arc::new(HeartbeatMonitor::new(bus.clone(), manager.clone()));
        let pulse = Arc::new(PulseRunner::new(
            Arc::new(NoopPulseHandler),
            Arc::new(crate::services::pulse_runner::NoUsers),
        ));
        manager.initialize(router, heartbeat, pulse).await;
    }

    #[tokio::test]
    async fn starting_an_unknown_bot_fails() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        initialize(&manager).await;
        let err = manager.start_bot("ghost", "manual", None).await.unwrap_err();
        assert_eq!(err, ActivationError::UnknownBot("ghost".to_string()));
    }

    #[tokio::test]
    async fn starting_a_bot_before_initialize_fails() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        manager.register(BotConfig::new("job_scout")).await;
        let err = manager.start_bot("job_scout", "manual", None).await.unwrap_err();
        assert_eq!(err, ActivationError::NotInitialized);
    }

    #[tokio::test]
    async fn starting_a_disabled_bot_fails() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        let mut cfg = BotConfig::new("job_scout");
        cfg.enabled = false;
        manager.register(cfg).await;
        initialize(&manager).await;
        let err = manager.start_bot("job_scout", "manual", None).await.unwrap_err();
        assert_eq!(err, ActivationError::BotDisabled("job_scout".to_string()));
    }

    #[tokio::test]
    async fn successful_run_transitions_to_waiting() {
        let runs = Arc::new(AtomicU32::new(0));
        let manager = make_manager(true, runs.clone());
        manager.register(BotConfig::new("job_scout")).await;
        initialize(&manager).await;
        manager.start_bot("job_scout", "manual", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let state = manager.get_bot_state("job_scout").await.unwrap();
        assert_eq!(state.status, BotStatus::Waiting);
        assert_eq!(state.total_runs, 1);
    }

    #[tokio::test]
    async fn failed_run_transitions_to_errored() {
        let manager = make_manager(false, Arc::new(AtomicU32::new(0)));
        manager.register(BotConfig::new("job_scout")).await;
        initialize(&manager).await;
        manager.start_bot("job_scout", "manual", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = manager.get_bot_state("job_scout").await.unwrap();
        assert_eq!(state.status, BotStatus::Errored);
    }

    #[tokio::test]
    async fn cannot_start_a_bot_already_running() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        manager.register(BotConfig::new("job_scout")).await;
        initialize(&manager).await;
        manager.start_bot("job_scout", "manual", None).await.unwrap();
        let err = manager.start_bot("job_scout", "manual", None).await.unwrap_err();
        assert_eq!(err, ActivationError::AlreadyRunning("job_scout".to_string()));
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips_status() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        manager.register(BotConfig::new("job_scout")).await;
        manager.pause_bot("job_scout").await;
        assert_eq!(manager.get_bot_state("job_scout").await.unwrap().status, BotStatus::Paused);
        manager.resume_bot("job_scout").await;
        assert_eq!(manager.get_bot_state("job_scout").await.unwrap().status, BotStatus::Waiting);
    }

    #[tokio::test]
    async fn re_enabling_a_disabled_bot_clears_the_paused_set() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        manager.register(BotConfig::new("job_scout")).await;
        initialize(&manager).await;

        manager.set_enabled("job_scout", false).await;
        manager.set_enabled("job_scout", true).await;

        manager.start_bot("job_scout", "manual", None).await.unwrap();
    }

    #[tokio::test]
    async fn create_custom_bot_rejects_a_duplicate_name() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        manager.register(BotConfig::new("job_scout")).await;
        let err = manager.create_custom_bot(BotConfig::new("job_scout")).await.unwrap_err();
        assert_eq!(err, ActivationError::AlreadyExists("job_scout".to_string()));
    }

    #[tokio::test]
    async fn create_then_start_a_custom_bot() {
        let runs = Arc::new(AtomicU32::new(0));
        let manager = make_manager(true, runs.clone());
        initialize(&manager).await;
        manager.create_custom_bot(BotConfig::new("side_project")).await.unwrap();
        manager.start_bot("side_project", "manual", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_custom_bot_rejects_an_unknown_name() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        let err = manager.delete_custom_bot("ghost").await.unwrap_err();
        assert_eq!(err, ActivationError::NotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn delete_custom_bot_rejects_a_builtin_bot() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        manager.register(BotConfig::new("job_scout")).await;
        let err = manager.delete_custom_bot("job_scout").await.unwrap_err();
        assert_eq!(err, ActivationError::IsBuiltin("job_scout".to_string()));
    }

    #[tokio::test]
    async fn delete_custom_bot_removes_a_previously_created_bot() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        manager.create_custom_bot(BotConfig::new("side_project")).await.unwrap();
        assert!(manager.get_bot_state("side_project").await.is_some());
        manager.delete_custom_bot("side_project").await.unwrap();
        assert!(manager.get_bot_state("side_project").await.is_none());
    }

    #[tokio::test]
    async fn handle_event_publishes_onto_the_bus() {
        let manager = make_manager(true, Arc::new(AtomicU32::new(0)));
        let mut sub = manager.bus.subscribe(None, true).await;
        let mut ctx = HashMap::new();
        ctx.insert("bot_name".to_string(), Value::String("job_scout".to_string()));
        manager.handle_event("user:job_saved", Some(ctx)).await;

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_type, "user:job_saved");
        assert_eq!(event.field("bot_name").unwrap().as_str().unwrap(), "job_scout");
    }
}
