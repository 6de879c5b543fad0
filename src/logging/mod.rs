//! Structured logging and observability for Meridian.
//!
//! Console logging is always enabled; JSON file logging with rotation is
//! opt-in via [`crate::config::LoggingConfig`].

pub mod structured;

pub use structured::{init_logging, LoggingGuard};
