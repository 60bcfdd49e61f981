//! Retry helpers used around the two fallible collaborators every bot run
//! touches: persistence (retried quietly, failures logged and swallowed) and
//! the executor itself (retried visibly, each attempt announced on the bus).

use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::error;

use crate::domain::error::PersistenceError;
use crate::domain::models::Event;
use crate::services::event_bus::EventBus;

/// Extra attempts after the first, for persistence calls. Total attempts
/// made is `DB_PERSIST_RETRIES + 1`.
const DB_PERSIST_RETRIES: u32 = 2;

/// Extra attempts after the first, for the executor itself.
const MAX_AUTO_RETRIES: u32 = 2;
const RETRY_BACKOFF_BASE_SECS: u64 = 5;

/// Run a persistence call, retrying on failure with linear backoff
/// (`0.5s * (attempt + 1)`). If every attempt fails the error is logged and
/// swallowed — a dropped log line or run record must never fail a bot run.
pub async fn persist_with_retry<F, Fut>(operation: &str, mut call: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), PersistenceError>>,
{
    for attempt in 0..=DB_PERSIST_RETRIES {
        match call().await {
            Ok(()) => return,
            Err(err) => {
                if attempt < DB_PERSIST_RETRIES {
                    sleep(Duration::from_millis(500 * u64::from(attempt + 1))).await;
                } else {
                    error!(operation, attempts = DB_PERSIST_RETRIES + 1, %err, "persistence call failed, giving up");
                }
            }
        }
    }
}

/// Outcome of one executor attempt, enough for the caller to decide whether
/// to retry.
pub struct AttemptOutcome<T> {
    pub value: T,
    pub retriable: bool,
}

/// Run `attempt` up to `MAX_AUTO_RETRIES + 1` times, backing off
/// exponentially (`5 * 2^attempt` seconds) between retriable failures and
/// publishing a `bot_run_retry` event before each retry.
pub async fn retry_with_backoff<F, Fut, T>(
    bus: &EventBus,
    bot_name: &str,
    run_id: &str,
    mut attempt: F,
) -> T
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptOutcome<T>>,
{
    let mut last = None;
    for n in 0..=MAX_AUTO_RETRIES {
        let outcome = attempt(n).await;
        if !outcome.retriable || n == MAX_AUTO_RETRIES {
            return outcome.value;
        }
        let wait_secs = RETRY_BACKOFF_BASE_SECS * 2u64.pow(n);
        bus.publish(
            Event::new("bot_run_retry")
                .with_field("bot_name", bot_name)
                .with_field("run_id", run_id)
                .with_field("attempt", n + 1)
                .with_field("max_retries", MAX_AUTO_RETRIES)
                .with_field("wait_seconds", wait_secs),
        )
        .await;
        sleep(Duration::from_secs(wait_secs)).await;
        last = Some(outcome.value);
    }
    // Unreachable in practice: the loop above always returns at n ==
    // MAX_AUTO_RETRIES. Kept only to satisfy the borrow checker's need for a
    // fallback value.
    last.expect("loop always returns before exhausting attempts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn persist_with_retry_stops_after_first_success() {
        let calls = AtomicU32::new(0);
        persist_with_retry("create_bot_run", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn persist_with_retry_tries_three_times_then_gives_up() {
        let calls = AtomicU32::new(0);
        persist_with_retry("create_bot_run", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PersistenceError::QueryFailed("boom".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), DB_PERSIST_RETRIES + 1);
    }

    #[tokio::test]
    async fn retry_with_backoff_stops_on_non_retriable_failure() {
        let bus = EventBus::new();
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&bus, "job_scout", "run-1", |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { AttemptOutcome { value: "auth_error", retriable: false } }
        })
        .await;
        assert_eq!(result, "auth_error");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
