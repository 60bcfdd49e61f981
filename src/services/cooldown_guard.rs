//! CooldownGuard: per-bot activation rate limiter.
//!
//! Tracks each bot's last activation timestamp and how many times it has run
//! today, resetting the daily count lazily at UTC midnight. High-priority
//! signals get half the configured cooldown.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::domain::models::Priority;

struct State {
    last_activation: HashMap<String, DateTime<Utc>>,
    daily_counts: HashMap<String, u32>,
    last_reset_date: Option<NaiveDate>,
}

/// Per-bot activation rate limiter, safe to share across the router and the
/// lifecycle manager.
pub struct CooldownGuard {
    state: Mutex<State>,
}

impl Default for CooldownGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                last_activation: HashMap::new(),
                daily_counts: HashMap::new(),
                last_reset_date: None,
            }),
        }
    }

    /// Whether `bot_name` may activate right now, given its configured
    /// cooldown and daily cap. `priority = High` halves the cooldown
    /// (integer division, matching the source project).
    pub async fn can_activate(
        &self,
        bot_name: &str,
        cooldown_minutes: u32,
        max_runs_per_day: u32,
        priority: Priority,
    ) -> bool {
        let mut state = self.state.lock().await;
        Self::maybe_reset_daily(&mut state);

        let daily = *state.daily_counts.get(bot_name).unwrap_or(&0);
        if daily >= max_runs_per_day {
            return false;
        }

        if let Some(last) = state.last_activation.get(bot_name) {
            let effective_cooldown = if priority == Priority::High {
                cooldown_minutes / 2
            } else {
                cooldown_minutes
            };
            let elapsed = Utc::now().signed_duration_since(*last);
            if elapsed < ChronoDuration::minutes(i64::from(effective_cooldown)) {
                return false;
            }
        }

        true
    }

    pub async fn record_activation(&self, bot_name: &str) {
        let mut state = self.state.lock().await;
        Self::maybe_reset_daily(&mut state);
        state.last_activation.insert(bot_name.to_string(), Utc::now());
        *state.daily_counts.entry(bot_name.to_string()).or_insert(0) += 1;
    }

    /// When the current cooldown expires, or `None` if the bot isn't in one.
    pub async fn cooldown_until(&self, bot_name: &str, cooldown_minutes: u32) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        let last = state.last_activation.get(bot_name)?;
        let expires = *last + ChronoDuration::minutes(i64::from(cooldown_minutes));
        (expires > Utc::now()).then_some(expires)
    }

    pub async fn daily_count(&self, bot_name: &str) -> u32 {
        let mut state = self.state.lock().await;
        Self::maybe_reset_daily(&mut state);
        *state.daily_counts.get(bot_name).unwrap_or(&0)
    }

    pub async fn last_activation(&self, bot_name: &str) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_activation.get(bot_name).copied()
    }

    fn maybe_reset_daily(state: &mut State) {
        let today = Utc::now().date_naive();
        if state.last_reset_date != Some(today) {
            state.daily_counts.clear();
            state.last_reset_date = Some(today);
        }
    }
}
