//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, following the
//! source project's layering: JSON or pretty stdout, or a non-blocking daily
//! file writer when a log directory is configured.

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat};
pub use logger::LoggerImpl;
