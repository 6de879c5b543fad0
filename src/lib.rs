// Meridian - Patient Journey Analytics Pipeline
// Copyright (c) 2025 Meridian Contributors
// Licensed under the MIT License

//! # Meridian - Patient Journey Analytics Pipeline
//!
//! Meridian ingests heterogeneous clinical event records (encounters, labs,
//! imaging, medications) from multiple source systems, normalizes them into
//! a single ordered per-patient timeline, and derives longitudinal
//! quality/cost/risk metrics from that timeline - correctly, incrementally,
//! and idempotently as new or late-arriving events come in.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Normalizing** raw heterogeneous payloads into canonical journey events
//! - **Sequencing** each patient's events into a dense, strictly increasing
//!   order that survives out-of-order and corrected arrivals
//! - **Deriving** length of stay, readmission links, cost, and quality scores
//! - **Materializing** patient, provider, and facility rolling snapshots
//! - **Auditing** every mutation through an explicit write interceptor
//!
//! ## Architecture
//!
//! Meridian follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (normalize, sequence, derive, materialize,
//!   audit, pipeline, query)
//! - [`adapters`] - External integrations (event sources, dead-letter sink,
//!   audit sink)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meridian::adapters::{JsonlAuditSink, JsonlDeadLetterSink, JsonlEventSource};
//! use meridian::config::MeridianConfig;
//! use meridian::core::PipelineCoordinator;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration
//!     let config = MeridianConfig::from_file("meridian.toml")?;
//!
//!     // Wire the pipeline to its external sinks
//!     let dead_letter = Arc::new(JsonlDeadLetterSink::new(&config.ingest.dead_letter_path)?);
//!     let audit = Arc::new(JsonlAuditSink::new(&config.audit.path)?);
//!     let coordinator = PipelineCoordinator::new(config, dead_letter, audit);
//!
//!     // Drain a source through the pipeline
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let mut source = JsonlEventSource::new("events.jsonl", "batch_import");
//!     let summary = coordinator.run(&mut source, shutdown_rx).await?;
//!
//!     println!("Ingested {} events", summary.events_inserted);
//!     Ok(())
//! }
//! ```
//!
//! ## Querying Derived State
//!
//! All reads go through the read-only query boundary and are point-in-time
//! consistent per entity:
//!
//! ```rust,no_run
//! use meridian::domain::PatientId;
//! # async fn example(coordinator: meridian::core::PipelineCoordinator)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let query = coordinator.query();
//! let patient_id = PatientId::new("PAT000001")?;
//!
//! let journey = query.journey(&patient_id).await?;
//! let links = query.readmission_links(&patient_id).await?;
//! let snapshot = query.patient_snapshot(&patient_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Meridian uses the [`domain::MeridianError`] type for all errors:
//!
//! ```rust,no_run
//! use meridian::domain::MeridianError;
//!
//! fn example() -> Result<(), MeridianError> {
//!     // Errors are automatically converted using the ? operator
//!     let config = meridian::config::MeridianConfig::from_file("meridian.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Meridian uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!("Starting ingest");
//! warn!(patient_id = "PAT000001", "Sequencing conflict recovered");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
