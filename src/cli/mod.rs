//! CLI interface module
//!
//! A small operational front-end over the activation core's public API
//! (§6a): bot inspection, event tailing, and manual triggers.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{BotsCommands, Cli, Commands};
