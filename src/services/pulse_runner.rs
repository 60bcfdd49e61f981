//! PulseRunner: adaptive background task advancing DNA-enabled bots'
//! knowledge state (§4.7).
//!
//! A single task runs at a cadence that speeds up when the system has been
//! active recently and slows down when it's quiet. The pulse body itself
//! (`PulseHandler::run_pulse`) is an opaque collaborator — this runner only
//! owns the scheduling and per-bot failure isolation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::domain::error::PulseError;

const FREQ_ACTIVE: Duration = Duration::from_secs(5 * 60);
const FREQ_QUIET: Duration = Duration::from_secs(15 * 60);
const FREQ_VERY_QUIET: Duration = Duration::from_secs(30 * 60);

const QUIET_AFTER: Duration = Duration::from_secs(15 * 60);
const VERY_QUIET_AFTER: Duration = Duration::from_secs(60 * 60);

/// The opaque per-bot-per-user pulse body. Out of scope for this crate: what
/// a pulse actually does to a bot's knowledge state belongs to the
/// collaborator that implements this trait.
#[async_trait]
pub trait PulseHandler: Send + Sync {
    async fn run_pulse(&self, bot_name: &str, user_id: &str) -> Result<(), PulseError>;
}

/// Supplies the set of known user ids a pulse should run for. Falls back to
/// a single empty id when persistence has none (matching the source
/// project's `_get_all_user_ids` fallback).
#[async_trait]
pub trait UserIdSource: Send + Sync {
    async fn all_user_ids(&self) -> Vec<String>;
}

pub struct NoUsers;

#[async_trait]
impl UserIdSource for NoUsers {
    async fn all_user_ids(&self) -> Vec<String> {
        Vec::new()
    }
}

struct State {
    bots: HashMap<String, (u32, u32)>,
    last_activity: Instant,
}

/// Single background task running pulse cycles for every DNA-enabled bot.
pub struct PulseRunner {
    state: Mutex<State>,
    handler: Arc<dyn PulseHandler>,
    users: Arc<dyn UserIdSource>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PulseRunner {
    #[must_use]
    pub fn new(handler: Arc<dyn PulseHandler>, users: Arc<dyn UserIdSource>) -> Self {
        Self {
            state: Mutex::new(State {
                bots: HashMap::new(),
                last_activity: Instant::now(),
            }),
            handler,
            users,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub async fn configure(&self, bot_name: &str, active_hours_start: u32, active_hours_end: u32) {
        self.state
            .lock()
            .await
            .bots
            .insert(bot_name.to_string(), (active_hours_start, active_hours_end));
    }

    /// Record that the system just did something — speeds up the pulse
    /// cadence for a while.
    pub async fn notify_activity(&self) {
        self.state.lock().await.last_activity = Instant::now();
    }

    /// Start the background loop. A no-op if no bots are configured, or if
    /// already running.
    pub async fn start(self: &Arc<Self>) {
        if self.state.lock().await.bots.is_empty() {
            info!("pulse runner has no configured bots, not starting");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let runner = self.clone();
        let handle = tokio::spawn(async move {
            while runner.running.load(Ordering::SeqCst) {
                let interval = runner.current_interval().await;
                sleep(interval).await;
                if !runner.running.load(Ordering::SeqCst) {
                    break;
                }
                runner.run_all().await;
            }
        });

        *self.task.lock().await = Some(handle);
        info!("pulse runner started");
    }

    async fn current_interval(&self) -> Duration {
        let elapsed = self.state.lock().await.last_activity.elapsed();
        if elapsed < QUIET_AFTER {
            FREQ_ACTIVE
        } else if elapsed < VERY_QUIET_AFTER {
            FREQ_QUIET
        } else {
            FREQ_VERY_QUIET
        }
    }

    async fn run_all(&self) {
        let current_hour = Utc::now().format("%H").to_string().parse::<u32>().unwrap_or(0);
        let bots: Vec<(String, u32, u32)> = self
            .state
            .lock()
            .await
            .bots
            .iter()
            .map(|(name, (start, end))| (name.clone(), *start, *end))
            .collect();

        for (bot_name, start, end) in bots {
            if !in_active_hours(current_hour, start, end) {
                continue;
            }

            let mut user_ids = self.users.all_user_ids().await;
            if user_ids.is_empty() {
                user_ids.push(String::new());
            }

            for user_id in user_ids {
                // A failure for one bot/user must never stop the rest of the
                // pass: log it and move on to the next one.
                if let Err(err) = self.handler.run_pulse(&bot_name, &user_id).await {
                    warn!(bot_name, user_id, %err, "pulse failed, continuing with remaining bots");
                }
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

/// Whether `current_hour` falls within `[start, end)`, wrapping past
/// midnight when `start > end` (e.g. `22..6`).
#[must_use]
pub fn in_active_hours(current_hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        start <= current_hour && current_hour < end
    } else {
        current_hour >= start || current_hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct CountingHandler {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PulseHandler for CountingHandler {
        async fn run_pulse(&self, _bot_name: &str, _user_id: &str) -> Result<(), PulseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails for one named bot, succeeds for every other.
    struct FailingForOneBot {
        failing_bot: String,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PulseHandler for FailingForOneBot {
        async fn run_pulse(&self, bot_name: &str, user_id: &str) -> Result<(), PulseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if bot_name == self.failing_bot {
                return Err(PulseError::Failed {
                    bot_name: bot_name.to_string(),
                    user_id: user_id.to_string(),
                    message: "scripted failure".to_string(),
                });
            }
            Ok(())
        }
    }

    struct FixedUsers(Vec<String>);

    #[async_trait]
    impl UserIdSource for FixedUsers {
        async fn all_user_ids(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    #[test]
    fn active_hours_simple_range() {
        assert!(in_active_hours(10, 6, 22));
        assert!(!in_active_hours(23, 6, 22));
    }

    #[test]
    fn active_hours_wraps_past_midnight() {
        assert!(in_active_hours(23, 22, 6));
        assert!(in_active_hours(2, 22, 6));
        assert!(!in_active_hours(12, 22, 6));
    }

    #[tokio::test]
    async fn run_all_skips_bots_outside_active_hours() {
        let handler = Arc::new(CountingHandler { calls: AtomicU32::new(0) });
        let runner = PulseRunner::new(handler.clone(), Arc::new(NoUsers));
        let current_hour = Utc::now().format("%H").to_string().parse::<u32>().unwrap();
        // Configure an active-hours window that excludes the current hour.
        let excluded_start = (current_hour + 1) % 24;
        let excluded_end = (current_hour + 2) % 24;
        runner.configure("job_scout", excluded_start, excluded_end).await;
        runner.run_all().await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_all_falls_back_to_empty_user_id() {
        let handler = Arc::new(CountingHandler { calls: AtomicU32::new(0) });
        let runner = PulseRunner::new(handler.clone(), Arc::new(NoUsers));
        runner.configure("job_scout", 0, 24).await;
        runner.run_all().await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_all_calls_handler_once_per_known_user() {
        let handler = Arc::new(CountingHandler { calls: AtomicU32::new(0) });
        let users = Arc::new(FixedUsers(vec!["alice".to_string(), "bob".to_string()]));
        let runner = PulseRunner::new(handler.clone(), users);
        runner.configure("job_scout", 0, 24).await;
        runner.run_all().await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_failing_bot_does_not_stop_the_rest_of_the_pass() {
        let handler = Arc::new(FailingForOneBot {
            failing_bot: "job_scout".to_string(),
            calls: AtomicU32::new(0),
        });
        let runner = PulseRunner::new(handler.clone(), Arc::new(NoUsers));
        runner.configure("job_scout", 0, 24).await;
        runner.configure("career_coach", 0, 24).await;
        runner.run_all().await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2, "both bots must still be attempted");
    }

    #[tokio::test]
    async fn start_is_a_no_op_with_no_configured_bots() {
        let handler = Arc::new(CountingHandler { calls: AtomicU32::new(0) });
        let runner = Arc::new(PulseRunner::new(handler, Arc::new(NoUsers)));
        runner.start().await;
        assert!(runner.task.lock().await.is_none());
    }
}
