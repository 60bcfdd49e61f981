//! Infrastructure layer
//!
//! Concrete adapters for the activation core's external dependencies:
//! - Configuration loading (figment)
//! - Structured logging (tracing)
//! - Database (SQLite with sqlx)

pub mod config;
pub mod database;
pub mod logging;
