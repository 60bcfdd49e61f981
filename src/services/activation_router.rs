//! ActivationRouter: the central nervous system for event-driven bot
//! activation (§4.3).
//!
//! Subscribes to the event bus with `include_heartbeats = false`, skips meta
//! events, and for every match runs it through the cooldown guard before
//! activating the bot through the lifecycle manager.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use crate::domain::models::{BotConfig, Event, IntentConfig, Priority};
use crate::services::bot_lifecycle_manager::BotLifecycleManager;
use crate::services::cooldown_guard::CooldownGuard;
use crate::services::event_bus::EventBus;
use crate::services::intent_matcher::IntentMatcher;

/// Consumes the event bus and activates matching bots, one long-lived
/// background task for the process's lifetime.
pub struct ActivationRouter {
    matcher: Arc<IntentMatcher>,
    cooldown: Arc<CooldownGuard>,
    lifecycle: Arc<BotLifecycleManager>,
    bus: Arc<EventBus>,
    intents: Mutex<HashMap<String, IntentConfig>>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ActivationRouter {
    #[must_use]
    pub fn new(
        matcher: Arc<IntentMatcher>,
        cooldown: Arc<CooldownGuard>,
        lifecycle: Arc<BotLifecycleManager>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            matcher,
            cooldown,
            lifecycle,
            bus,
            intents: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub async fn register(&self, bot: BotConfig) {
        self.intents.lock().await.insert(bot.name.clone(), bot.intent.clone());
        self.matcher.register(bot).await;
    }

    pub async fn unregister(&self, bot_name: &str) {
        self.intents.lock().await.remove(bot_name);
        self.matcher.unregister(bot_name).await;
    }

    /// Spawn the consume loop. Idempotent: calling `start` while already
    /// running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let router = self.clone();
        let handle = tokio::spawn(async move {
            let mut sub = router.bus.subscribe(None, false).await;
            while router.running.load(Ordering::SeqCst) {
                let event = match timeout(Duration::from_secs(1), sub.recv()).await {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(_) => continue,
                };

                if event.is_meta() {
                    continue;
                }

                let matches = router.matcher.matches(&event).await;
                for candidate in matches {
                    router.try_activate(&candidate.bot_name, candidate.priority, &event).await;
                }
            }
        });

        *self.task.lock().await = Some(handle);
        info!("activation router started");
    }

    async fn try_activate(&self, bot_name: &str, priority: Priority, event: &Event) {
        let intent = {
            let intents = self.intents.lock().await;
            match intents.get(bot_name) {
                Some(intent) => intent.clone(),
                None => return,
            }
        };

        let allowed = self
            .cooldown
            .can_activate(bot_name, intent.cooldown_minutes, intent.max_runs_per_day, priority)
            .await;
        if !allowed {
            return;
        }

        let trigger = format!("event:{}", event.event_type);
        info!(bot_name, priority = ?priority, event_type = %event.event_type, "router activating bot");
        match self.lifecycle.start_bot(bot_name, &trigger, None).await {
            Ok(()) => self.cooldown.record_activation(bot_name).await,
            Err(err) => warn!(bot_name, %err, "router failed to activate bot"),
        }
    }

    /// Stop the consume loop and wait for it to unwind.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{ActivationError, PersistenceError};
    use crate::domain::models::IntentSignal;
    use crate::domain::ports::{BotExecutor, ExecutionOutcome, PersistencePort};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::Value;
    use std::sync::atomic::AtomicU32;

    struct ImmediateExecutor {
        runs: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BotExecutor for ImmediateExecutor {
        async fn execute(&self, _cfg: &BotConfig, _trigger: &str, _context: Option<&str>) -> ExecutionOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            ExecutionOutcome {
                ok: true,
                output: "done".to_string(),
                input_tokens: 1,
                output_tokens: 1,
                cost_cents: 0,
                error: None,
            }
        }
    }

    struct NullPersistence;

    #[async_trait]
    impl PersistencePort for NullPersistence {
        async fn create_bot_run(&self, _: &str, _: &str, _: &str, _: DateTime<Utc>) -> Result<(), PersistenceError> {
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
        async fn update_bot_state(&self, _: &str, _: &str, _: Option<DateTime<Utc>>) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    struct NoopPulseHandler;

    #[async_trait]
    impl crate::services::pulse_runner::PulseHandler for NoopPulseHandler {
        async fn run_pulse(&self, _bot_name: &str, _user_id: &str) -> Result<(), crate::domain::error::PulseError> {
            unreachable!("pulse runner is never started in these tests")
        }
    }

    async fn make_router(runs: Arc<AtomicU32>) -> Arc<ActivationRouter> {
        let bus = Arc::new(EventBus::new());
        let cooldown = Arc::new(CooldownGuard::new());
        let matcher = Arc::new(IntentMatcher::new());
        let lifecycle = Arc::new(BotLifecycleManager::new(
            Arc::new(ImmediateExecutor { runs }),
            Arc::new(NullPersistence),
            bus.clone(),
            cooldown.clone(),
        ));
        let router = Arc::new(ActivationRouter::new(matcher, cooldown, lifecycle.clone(), bus.clone()));
        let heartbeat = Arc::new(crate::services::heartbeat_monitor::HeartbeatMonitor::new(bus.clone(), lifecycle.clone()));
        let pulse = Arc::new(crate::services::pulse_runner::PulseRunner::new(
            Arc::new(NoopPulseHandler),
            Arc::new(crate::services::pulse_runner::NoUsers),
        ));
        lifecycle.initialize(router.clone(), heartbeat, pulse).await;
        router
    }

    #[tokio::test]
    async fn meta_events_never_activate_bots() {
        let runs = Arc::new(AtomicU32::new(0));
        let router = make_router(runs.clone()).await;
        let mut bot = BotConfig::new("job_scout");
        bot.intent.signals = vec![IntentSignal {
            pattern: "*".to_string(),
            filter: HashMap::new(),
            priority: Priority::Medium,
        }];
        router.lifecycle.register(bot.clone()).await;
        router.register(bot).await;
        router.start().await;

        router.bus.publish(Event::new("bot_state_change")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        router.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn matching_event_activates_registered_bot() {
        let runs = Arc::new(AtomicU32::new(0));
        let router = make_router(runs.clone()).await;
        let mut bot = BotConfig::new("job_scout");
        bot.intent.signals = vec![IntentSignal {
            pattern: "user:job_saved".to_string(),
            filter: HashMap::new(),
            priority: Priority::Medium,
        }];
        router.lifecycle.register(bot.clone()).await;
        router.register(bot).await;
        router.start().await;

        router.bus.publish(Event::new("user:job_saved")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        router.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[allow(dead_code)]
    fn assert_activation_error_is_debug(e: ActivationError) -> String {
        format!("{e}")
    }
}
