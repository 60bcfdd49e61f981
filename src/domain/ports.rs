//! Port traits separating the activation core from its external collaborators.
//!
//! The core never calls an LLM, touches a database, or knows an HTTP client
//! exists; it only depends on these two trait boundaries, matching the
//! hexagonal layering the rest of this codebase uses for its repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::PersistenceError;
use super::models::BotConfig;

/// Outcome of a single bot execution, as reported by the opaque executor.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub ok: bool,
    pub output: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_cents: u64,
    /// Present only when `ok` is false; the raw message the executor
    /// produced, classified by `BotRunErrorKind::classify`.
    pub error: Option<String>,
}

/// The LLM-driven bot execution body. Out of scope for this crate: prompt
/// assembly, tool calls, and the executor's own internal retry loop are the
/// opaque collaborator's business. The activation core only needs to invoke
/// it and interpret the outcome.
#[async_trait]
pub trait BotExecutor: Send + Sync {
    async fn execute(
        &self,
        cfg: &BotConfig,
        trigger: &str,
        context: Option<&str>,
    ) -> ExecutionOutcome;
}

/// The five persistence touchpoints named in §6. Every call must be wrapped
/// by the caller in the retry-log-swallow helper (see `services::retry`);
/// the trait itself is a thin, fallible interface.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn create_bot_run(
        &self,
        run_id: &str,
        bot_name: &str,
        trigger: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    async fn complete_bot_run(
        &self,
        run_id: &str,
        status: &str,
        output: &str,
        input_tokens: u64,
        output_tokens: u64,
        cost_cents: u64,
    ) -> Result<(), PersistenceError>;

    async fn create_bot_log(
        &self,
        run_id: &str,
        level: &str,
        event_type: &str,
        message: &str,
        data: Option<Value>,
    ) -> Result<(), PersistenceError>;

    async fn upsert_bot_record(
        &self,
        name: &str,
        display_name: &str,
        config: &Value,
    ) -> Result<(), PersistenceError>;

    async fn update_bot_state(
        &self,
        name: &str,
        status: &str,
        last_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), PersistenceError>;
}
