//! HeartbeatMonitor: a safety net that nudges bots idle for too long.
//!
//! A single background task sleeps through a startup grace period, then
//! checks every `CHECK_INTERVAL` whether any configured bot has gone
//! `heartbeat_hours` without a run. It never starts a bot directly — it only
//! publishes `heartbeat:bot_idle`, leaving activation to the router.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::domain::models::Event;
use crate::services::bot_lifecycle_manager::BotLifecycleManager;
use crate::services::event_bus::EventBus;

const CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);
const STARTUP_GRACE: Duration = Duration::from_secs(10 * 60);

pub struct HeartbeatMonitor {
    bus: Arc<EventBus>,
    lifecycle: Arc<BotLifecycleManager>,
    thresholds: Mutex<HashMap<String, u32>>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(bus: Arc<EventBus>, lifecycle: Arc<BotLifecycleManager>) -> Self {
        Self {
            bus,
            lifecycle,
            thresholds: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Register a bot's heartbeat threshold. A `heartbeat_hours` of `0`
    /// (the default) opts the bot out of idle nudges entirely.
    pub async fn configure(&self, bot_name: &str, heartbeat_hours: u32) {
        if heartbeat_hours > 0 {
            self.thresholds.lock().await.insert(bot_name.to_string(), heartbeat_hours);
        }
    }

    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let monitor = self.clone();
        let started_at = Utc::now();

        let handle = tokio::spawn(async move {
            sleep(STARTUP_GRACE).await;
            while monitor.running.load(Ordering::SeqCst) {
                monitor.check_all(started_at).await;
                sleep(CHECK_INTERVAL).await;
            }
        });

        *self.task.lock().await = Some(handle);
        info!(interval_secs = CHECK_INTERVAL.as_secs(), "heartbeat monitor started");
    }

    async fn check_all(&self, started_at: chrono::DateTime<Utc>) {
        let thresholds = self.thresholds.lock().await.clone();
        let now = Utc::now();

        for (bot_name, heartbeat_hours) in thresholds {
            let last_run = self
                .lifecycle
                .get_bot_state(&bot_name)
                .await
                .and_then(|state| state.last_run_at)
                .unwrap_or(started_at);

            let hours_idle = now.signed_duration_since(last_run).num_seconds() as f64 / 3600.0;
            if hours_idle >= f64::from(heartbeat_hours) {
                info!(bot_name, hours_idle, heartbeat_hours, "bot idle past threshold, nudging");
                self.bus
                    .publish(
                        Event::new("heartbeat:bot_idle")
                            .with_field("bot_name", bot_name.as_str())
                            .with_field("hours_idle", (hours_idle * 10.0).round() / 10.0)
                            .with_field("heartbeat_hours", heartbeat_hours),
                    )
                    .await;
            }
        }
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}
