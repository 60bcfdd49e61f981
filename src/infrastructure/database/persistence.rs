//! SQLite-backed implementation of the activation core's `PersistencePort`.
//!
//! Backs the five persistence touchpoints named in §6 with the three-table
//! schema from §6a. This adapter is intentionally dumb: it does not retry or
//! classify failures itself — every call is wrapped by
//! `services::retry::persist_with_retry` at the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::domain::error::PersistenceError;
use crate::domain::ports::PersistencePort;

pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistencePort for SqlitePersistence {
    async fn create_bot_run(
        &self,
        run_id: &str,
        bot_name: &str,
        trigger: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO bot_runs (run_id, bot_name, trigger_type, started_at) VALUES (?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(bot_name)
        .bind(trigger)
        .bind(started_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_bot_run(
        &self,
        run_id: &str,
        status: &str,
        output: &str,
        input_tokens: u64,
        output_tokens: u64,
        cost_cents: u64,
    ) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE bot_runs SET completed_at = ?, status = ?, output = ?, input_tokens = ?, output_tokens = ?, cost_cents = ? WHERE run_id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status)
        .bind(output)
        .bind(input_tokens as i64)
        .bind(output_tokens as i64)
        .bind(cost_cents as i64)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::RowNotFound);
        }
        Ok(())
    }

    async fn create_bot_log(
        &self,
        run_id: &str,
        level: &str,
        event_type: &str,
        message: &str,
        data: Option<Value>,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO bot_logs (run_id, level, event_type, message, data, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(level)
        .bind(event_type)
        .bind(message)
        .bind(data.map(|v| v.to_string()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_bot_record(
        &self,
        name: &str,
        display_name: &str,
        config: &Value,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO bot_records (name, display_name, config_json, status) VALUES (?, ?, ?, 'waiting')
             ON CONFLICT(name) DO UPDATE SET display_name = excluded.display_name, config_json = excluded.config_json",
        )
        .bind(name)
        .bind(display_name)
        .bind(config.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_bot_state(
        &self,
        name: &str,
        status: &str,
        last_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), PersistenceError> {
        let result = sqlx::query("UPDATE bot_records SET status = ?, last_run_at = COALESCE(?, last_run_at) WHERE name = ?")
            .bind(status)
            .bind(last_run_at.map(|t| t.to_rfc3339()))
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::RowNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::connection::DatabaseConnection;
    use serde_json::json;

    async fn setup() -> (DatabaseConnection, SqlitePersistence) {
        let db = DatabaseConnection::new("sqlite::memory:", 5).await.unwrap();
        db.migrate().await.unwrap();
        let persistence = SqlitePersistence::new(db.pool().clone());
        (db, persistence)
    }

    #[tokio::test]
    async fn create_then_complete_bot_run_round_trips() {
        let (_db, persistence) = setup().await;
        persistence
            .create_bot_run("run-1", "job_scout", "event:user:job_saved", Utc::now())
            .await
            .unwrap();
        persistence
            .complete_bot_run("run-1", "waiting", "done", 10, 20, 5)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn complete_bot_run_on_unknown_run_id_fails() {
        let (_db, persistence) = setup().await;
        let result = persistence.complete_bot_run("ghost", "waiting", "", 0, 0, 0).await;
        assert!(matches!(result, Err(PersistenceError::RowNotFound)));
    }

    #[tokio::test]
    async fn upsert_bot_record_is_idempotent() {
        let (_db, persistence) = setup().await;
        persistence
            .upsert_bot_record("job_scout", "Job Scout", &json!({"enabled": true}))
            .await
            .unwrap();
        persistence
            .upsert_bot_record("job_scout", "Job Scout v2", &json!({"enabled": false}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_bot_state_on_unknown_bot_fails() {
        let (_db, persistence) = setup().await;
        let result = persistence.update_bot_state("ghost", "waiting", None).await;
        assert!(matches!(result, Err(PersistenceError::RowNotFound)));
    }

    #[tokio::test]
    async fn create_bot_log_accepts_structured_data() {
        let (_db, persistence) = setup().await;
        persistence
            .create_bot_run("run-2", "job_scout", "manual", Utc::now())
            .await
            .unwrap();
        persistence
            .create_bot_log("run-2", "info", "bot_run_start", "starting", Some(json!({"trigger": "manual"})))
            .await
            .unwrap();
    }
}
