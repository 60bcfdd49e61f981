//! Database infrastructure
//!
//! SQLite implementation of the activation core's persistence port using
//! sqlx, with:
//! - WAL-mode connection pooling
//! - Startup migrations
//! - A `PersistencePort` adapter backing the five touchpoints in §6

pub mod connection;
pub mod persistence;

pub use connection::DatabaseConnection;
pub use persistence::SqlitePersistence;
