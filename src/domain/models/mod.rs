//! Domain models for the activation core.
//!
//! Pure domain entities: no I/O, no async, no infrastructure concerns.

pub mod bot;
pub mod event;

pub use bot::{BotConfig, BotState, BotStatus, IntentConfig, IntentSignal, Priority, PulseConfig};
pub use event::{Event, META_EVENTS};
