//! Sentinel - event-driven bot activation core
//!
//! Reacts to events flowing through a shared bus, matches them against
//! registered bots' intent signals, enforces cooldowns and daily caps, and
//! drives bot runs through a pluggable executor with:
//! - Per-subscriber bounded event bus with replay and heartbeats
//! - Glob-pattern intent matching with per-bot filters
//! - Cooldown/daily-cap guarding with priority-aware half-cooldowns
//! - Bot lifecycle management (start/stop/pause/resume) with timeout and retry
//! - Idle-bot heartbeat nudges and an adaptive pulse scheduler
//! - SQLite-backed persistence with WAL mode

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use infrastructure::database::DatabaseConnection;
