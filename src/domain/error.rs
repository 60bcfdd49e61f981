//! Domain error types for the activation core.
//!
//! Each enum covers errors from one concern, following the same
//! per-subsystem `thiserror` layout the rest of this codebase uses.

use thiserror::Error;

/// Errors raised by the configuration loader.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid YAML: {0}")]
    InvalidYaml(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("I/O error reading config: {0}")]
    IoError(String),

    #[error("Environment variable error: {0}")]
    EnvVarError(String),
}

/// Errors from the SQLite-backed persistence adapter.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Row not found")]
    RowNotFound,
}

impl PersistenceError {
    /// Transient failures are worth the retry-log-swallow wrapper's extra
    /// attempts; anything else (e.g. a constraint violation) will not
    /// succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::QueryFailed(_))
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::RowNotFound,
            other => Self::QueryFailed(other.to_string()),
        }
    }
}

/// Errors a `PulseHandler` can report for a single bot/user pass. The pulse
/// body is an opaque collaborator (§4.7); this only needs to carry enough
/// for the runner to log and move on to the next bot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PulseError {
    #[error("pulse for {bot_name} ({user_id}) failed: {message}")]
    Failed { bot_name: String, user_id: String, message: String },
}

/// Typed rejection codes for lifecycle-manager operations (§4.4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("Unknown bot: {0}")]
    UnknownBot(String),

    #[error("Bot {0} is paused")]
    BotPaused(String),

    #[error("Bot {0} is disabled")]
    BotDisabled(String),

    #[error("Bot {0} is already running")]
    AlreadyRunning(String),

    #[error("Activation core not initialized")]
    NotInitialized,

    #[error("Bot {0} already exists")]
    AlreadyExists(String),

    #[error("Bot {0} not found")]
    NotFound(String),

    #[error("Bot {0} is built-in and cannot be deleted")]
    IsBuiltin(String),
}

/// Classification of a bot execution failure, per the §7 error-kind table.
///
/// The executor is an opaque collaborator (out of scope for this crate); all
/// we see of its failures is an error message, so classification is done by
/// substring detection exactly as the source project classifies its own
/// `ClaudeApiError`/bot-run failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotRunErrorKind {
    #[error("rate limit exceeded")]
    RateLimit,

    #[error("run timed out")]
    Timeout,

    #[error("authentication failed")]
    Auth,

    #[error("connection error")]
    Connection,

    #[error("runtime error")]
    Runtime,

    #[error("run was cancelled")]
    Cancelled,
}

impl BotRunErrorKind {
    /// Classify a raw executor error message into one of the §7 kinds.
    ///
    /// Detection order matters: `rate_limit`/`429` is checked before the
    /// generic `timeout` check since both can appear together in a message.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("rate_limit") || lower.contains("429") {
            Self::RateLimit
        } else if lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("api_key") || lower.contains("authentication") {
            Self::Auth
        } else if lower.contains("connection") {
            Self::Connection
        } else {
            Self::Runtime
        }
    }

    /// Whether the executor-level retry policy (§7) should retry this kind.
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout | Self::Connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limit_by_substring() {
        assert_eq!(
            BotRunErrorKind::classify("received 429 from upstream"),
            BotRunErrorKind::RateLimit
        );
        assert_eq!(
            BotRunErrorKind::classify("rate_limit exceeded, slow down"),
            BotRunErrorKind::RateLimit
        );
    }

    #[test]
    fn classifies_timeout() {
        assert_eq!(
            BotRunErrorKind::classify("request Timeout after 30s"),
            BotRunErrorKind::Timeout
        );
    }

    #[test]
    fn classifies_auth_failures_as_non_retriable() {
        let kind = BotRunErrorKind::classify("invalid api_key supplied");
        assert_eq!(kind, BotRunErrorKind::Auth);
        assert!(!kind.is_retriable());
    }

    #[test]
    fn classifies_connection_errors() {
        assert_eq!(
            BotRunErrorKind::classify("Connection reset by peer"),
            BotRunErrorKind::Connection
        );
    }

    #[test]
    fn unmatched_message_classifies_as_runtime() {
        let kind = BotRunErrorKind::classify("division by zero");
        assert_eq!(kind, BotRunErrorKind::Runtime);
        assert!(!kind.is_retriable());
    }

    #[test]
    fn retriable_kinds() {
        assert!(BotRunErrorKind::RateLimit.is_retriable());
        assert!(BotRunErrorKind::Timeout.is_retriable());
        assert!(BotRunErrorKind::Connection.is_retriable());
        assert!(!BotRunErrorKind::Cancelled.is_retriable());
        assert!(!BotRunErrorKind::Runtime.is_retriable());
    }

    #[test]
    fn persistence_error_transience() {
        assert!(PersistenceError::ConnectionFailed("x".into()).is_transient());
        assert!(!PersistenceError::RowNotFound.is_transient());
    }
}
