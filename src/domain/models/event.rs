//! Event envelope broadcast through the activation core's event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Event types that must never trigger bot activation.
///
/// Excluding these from intent matching is the feedback-loop guard: every
/// lifecycle/meta event the core itself emits would otherwise be eligible to
/// re-trigger the very bots whose activity produced it.
pub const META_EVENTS: &[&str] = &[
    "bot_state_change",
    "bot_log",
    "heartbeat",
    "bots_state",
    "bot_run_start",
    "bot_run_retry",
];

/// An immutable, ordered record broadcast through the event bus.
///
/// `event_id` is assigned by the bus at publish time and is strictly
/// increasing within a process lifetime. The domain payload is deliberately
/// open (`HashMap<String, Value>`) rather than a closed variant set: callers
/// may publish any hierarchical `type` string (`bot_completed:job_scout`,
/// `user:job_saved`, ...) with arbitrary fields, and only the handful of
/// meta/lifecycle types above are special-cased by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub event_id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(flatten)]
    pub payload: HashMap<String, Value>,
}

fn default_source() -> String {
    "bot".to_string()
}

impl Event {
    /// Construct an event with `event_id`/`timestamp` left at their defaults;
    /// the bus fills these in on publish.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_id: 0,
            event_type: event_type.into(),
            timestamp: Utc::now(),
            source: default_source(),
            payload: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.payload
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_meta(&self) -> bool {
        META_EVENTS.contains(&self.event_type.as_str())
    }

    /// Build the synthetic heartbeat event a subscriber receives when no live
    /// event arrives within the heartbeat interval.
    #[must_use]
    pub fn heartbeat(current_event_id: u64) -> Self {
        Self {
            event_id: current_event_id,
            event_type: "heartbeat".to_string(),
            timestamp: Utc::now(),
            source: default_source(),
            payload: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_events_are_recognized() {
        let event = Event::new("bot_state_change");
        assert!(event.is_meta());
    }

    #[test]
    fn domain_events_are_not_meta() {
        let event = Event::new("user:job_saved");
        assert!(!event.is_meta());
    }

    #[test]
    fn tags_extracts_string_array() {
        let event = Event::new("user:job_saved")
            .with_field("tags", serde_json::json!(["remote", "senior"]));
        assert_eq!(event.tags(), vec!["remote".to_string(), "senior".to_string()]);
    }

    #[test]
    fn tags_defaults_to_empty() {
        let event = Event::new("user:job_saved");
        assert!(event.tags().is_empty());
    }
}
