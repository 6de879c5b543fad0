//! Configuration management for Meridian.
//!
//! This module provides TOML-based configuration loading, parsing, and
//! validation. Values may reference environment variables with `${VAR}`
//! syntax, and a small set of `MERIDIAN_*` environment overrides is applied
//! after parsing.
//!
//! # Example
//!
//! ```no_run
//! use meridian::config::MeridianConfig;
//!
//! let config = MeridianConfig::from_file("meridian.toml").expect("load config");
//! assert!(config.pipeline.stay_threshold_hours > 0.0);
//! ```

pub mod loader;
pub mod schema;

pub use loader::load_config;
pub use schema::{
    ApplicationConfig, AuditConfig, IngestConfig, LoggingConfig, MeridianConfig, PipelineConfig,
    SnapshotConfig,
};
