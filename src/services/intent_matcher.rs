//! IntentMatcher: maps an incoming event to the bots whose registered
//! signals match it.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::models::{BotConfig, Event, Priority};

/// A single match: the bot to activate and the priority its matching signal
/// was registered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMatch {
    pub bot_name: String,
    pub priority: Priority,
}

/// Evaluates events against every bot's registered intent.
///
/// Bots are kept in a `Vec` rather than a `HashMap` specifically so
/// registration order survives into `matches`' tiebreak: a `HashMap`'s
/// SipHash-randomized iteration order would make `sort_by_key`'s stability
/// preserve an arbitrary order among same-priority bots instead of
/// registration order.
pub struct IntentMatcher {
    intents: RwLock<Vec<BotConfig>>,
}

impl Default for IntentMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            intents: RwLock::new(Vec::new()),
        }
    }

    /// Register a bot. Re-registering an already-known name updates its
    /// config in place rather than moving it to the end, so its tiebreak
    /// position stays tied to when it was first registered.
    pub async fn register(&self, bot: BotConfig) {
        let mut intents = self.intents.write().await;
        match intents.iter_mut().find(|b| b.name == bot.name) {
            Some(existing) => *existing = bot,
            None => intents.push(bot),
        }
    }

    pub async fn unregister(&self, bot_name: &str) {
        self.intents.write().await.retain(|b| b.name != bot_name);
    }

    /// Match an event against every registered bot, returning one entry per
    /// bot whose signals matched (first matching signal wins per bot), sorted
    /// high-priority-first with registration order preserved among ties.
    pub async fn matches(&self, event: &Event) -> Vec<IntentMatch> {
        let intents = self.intents.read().await;
        let mut matches = Vec::new();

        for bot in intents.iter() {
            for signal in &bot.intent.signals {
                if !glob_match(&signal.pattern, &event.event_type) {
                    continue;
                }
                if !check_filters(event, &signal.filter) {
                    continue;
                }
                matches.push(IntentMatch {
                    bot_name: bot.name.clone(),
                    priority: signal.priority,
                });
                break;
            }
        }

        matches.sort_by_key(|m| m.priority);
        matches
    }
}

/// Check whether an event's fields satisfy a signal's filter map.
///
/// `tags_any` is special-cased: the expected value is a JSON array and the
/// filter passes if the event's tags intersect it. `gene_type` and any other
/// key fall back to exact equality against the matching payload field.
fn check_filters(event: &Event, filters: &HashMap<String, serde_json::Value>) -> bool {
    for (key, expected) in filters {
        if key == "tags_any" {
            let expected_tags: Vec<String> = expected
                .as_array()
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let event_tags = event.tags();
            if !expected_tags.iter().any(|t| event_tags.contains(t)) {
                return false;
            }
        } else if event.field(key) != Some(expected) {
            return false;
        }
    }
    true
}

/// Minimal shell-style glob: `*` matches any run of characters, everything
/// else matches literally. Covers the patterns bots are configured with
/// (`"bot_completed:*"`, `"user:*"`, exact event names); a path-aware glob
/// crate would misinterpret the `:` and `_` delimiters these patterns use.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some(b'*') => {
                inner(&pattern[1..], text)
                    || (!text.is_empty() && inner(pattern, &text[1..]))
            }
            Some(&c) => !text.is_empty() && text[0] == c && inner(&pattern[1..], &text[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}
