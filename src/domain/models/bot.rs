//! Bot configuration and runtime state models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Activation priority of an intent signal. Ordered `High < Medium < Low` so
/// a simple sort yields the priority order the matcher's contract requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// One event pattern a bot listens for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSignal {
    /// Shell-style glob over `Event::event_type`, e.g. `"bot_completed:*"`.
    pub pattern: String,
    #[serde(default)]
    pub filter: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub priority: Priority,
}

/// A bot's full activation intent: the signals it reacts to plus its rate
/// limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default)]
    pub signals: Vec<IntentSignal>,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,
    #[serde(default = "default_max_runs_per_day")]
    pub max_runs_per_day: u32,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            signals: Vec::new(),
            cooldown_minutes: default_cooldown_minutes(),
            max_runs_per_day: default_max_runs_per_day(),
        }
    }
}

const fn default_cooldown_minutes() -> u32 {
    120
}

const fn default_max_runs_per_day() -> u32 {
    6
}

/// Pulse configuration: which bots receive periodic knowledge-advancement
/// ticks, and during which hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_active_hours_start")]
    pub active_hours_start: u32,
    #[serde(default = "default_active_hours_end")]
    pub active_hours_end: u32,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            active_hours_start: default_active_hours_start(),
            active_hours_end: default_active_hours_end(),
        }
    }
}

const fn default_active_hours_start() -> u32 {
    6
}

const fn default_active_hours_end() -> u32 {
    22
}

/// External, read-only input describing a configured bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Filled from the enclosing `bots.<name>` map key when loaded from
    /// config; not expected in the per-bot YAML block itself.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u32,
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: u32,
    #[serde(default)]
    pub heartbeat_hours: u32,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub pulse: PulseConfig,
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_minutes() -> u32 {
    10
}

const fn default_max_concurrent_runs() -> u32 {
    1
}

impl BotConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            enabled: true,
            timeout_minutes: default_timeout_minutes(),
            max_concurrent_runs: default_max_concurrent_runs(),
            heartbeat_hours: 0,
            intent: IntentConfig::default(),
            pulse: PulseConfig::default(),
        }
    }
}

/// The bot's current place in the lifecycle state machine (see §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Disabled,
    Waiting,
    Running,
    Paused,
    Stopped,
    Errored,
}

/// Mutable runtime state owned exclusively by the `BotLifecycleManager`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotState {
    pub name: String,
    pub status: BotStatus,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub runs_today: u32,
    pub total_runs: u64,
    pub last_activated_by: Option<String>,
}

impl BotState {
    #[must_use]
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            status: if enabled {
                BotStatus::Waiting
            } else {
                BotStatus::Disabled
            },
            enabled,
            last_run_at: None,
            cooldown_until: None,
            runs_today: 0,
            total_runs: 0,
            last_activated_by: None,
        }
    }
}
