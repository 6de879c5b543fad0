//! Ingest command implementation
//!
//! This module implements the `ingest` command for running raw event files
//! through the full pipeline.

use crate::adapters::{JsonlAuditSink, JsonlDeadLetterSink, JsonlEventSource};
use crate::config::load_config;
use crate::core::pipeline::summary::IngestSummary;
use crate::core::PipelineCoordinator;
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Raw event file(s) in JSON-lines format
    #[arg(short, long, required = true)]
    pub input: Vec<String>,

    /// Override the declared source-system tag
    #[arg(long)]
    pub source_system: Option<String>,

    /// Write all published snapshots to this JSON file after the run
    #[arg(long, value_name = "PATH")]
    pub snapshots_out: Option<String>,
}

impl IngestArgs {
    /// Execute the ingest command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting ingest command");

        let config = load_config(config_path)?;
        let source_system = self
            .source_system
            .clone()
            .unwrap_or_else(|| config.ingest.source_system.clone());

        let dead_letter = Arc::new(JsonlDeadLetterSink::new(&config.ingest.dead_letter_path)?);
        let audit = Arc::new(JsonlAuditSink::new(&config.audit.path)?);
        let coordinator = PipelineCoordinator::new(config, dead_letter, audit);

        // Keep snapshots inside the staleness bound while files are draining
        let refresh_task = coordinator
            .materializer()
            .spawn_periodic(shutdown_signal.clone());

        println!("🚀 Starting ingest...");
        println!();

        let mut combined = IngestSummary::new();
        for input in &self.input {
            let mut source = JsonlEventSource::new(input, source_system.clone());
            let summary = match coordinator.run(&mut source, shutdown_signal.clone()).await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::error!(input = %input, error = %e, "Ingest failed");
                    eprintln!("Ingest failed for {input}: {e}");
                    return Ok(5); // Fatal error exit code
                }
            };
            summary.log_summary();
            merge_summaries(&mut combined, summary);

            if *shutdown_signal.borrow() {
                break;
            }
        }
        refresh_task.abort();

        println!();
        println!("📊 Ingest Summary:");
        println!("  Raw records: {}", combined.total_raw);
        println!("  Normalized: {}", combined.normalized);
        println!("  Dead-lettered: {}", combined.dead_lettered);
        println!("  Events inserted: {}", combined.events_inserted);
        println!("  Events superseded: {}", combined.events_superseded);
        println!("  Sequencing conflicts: {}", combined.sequencing_conflicts);
        println!("  Patients touched: {}", combined.patients_touched);
        println!("  Snapshots refreshed: {}", combined.snapshots_refreshed);
        println!("  Snapshots stale: {}", combined.snapshots_failed);
        println!("  Duration: {:.2}s", combined.duration.as_secs_f64());
        println!();

        if let Some(path) = &self.snapshots_out {
            write_snapshots(&coordinator, path)?;
            println!("📁 Snapshots written to {path}");
        }

        if combined.is_successful() {
            println!("✅ Ingest completed successfully");
            Ok(0)
        } else {
            println!(
                "⚠️  Ingest completed with {} error(s)",
                combined.errors.len().max(combined.snapshots_failed)
            );
            Ok(2) // Completed-with-errors exit code
        }
    }
}

fn merge_summaries(combined: &mut IngestSummary, summary: IngestSummary) {
    combined.total_raw += summary.total_raw;
    combined.normalized += summary.normalized;
    combined.dead_lettered += summary.dead_lettered;
    combined.events_inserted += summary.events_inserted;
    combined.events_superseded += summary.events_superseded;
    combined.sequencing_conflicts += summary.sequencing_conflicts;
    combined.patients_touched += summary.patients_touched;
    combined.snapshots_refreshed += summary.snapshots_refreshed;
    combined.snapshots_failed += summary.snapshots_failed;
    combined.duration += summary.duration;
    combined.errors.extend(summary.errors);
}

fn write_snapshots(coordinator: &PipelineCoordinator, path: &str) -> anyhow::Result<()> {
    let query = coordinator.query();
    let document = serde_json::json!({
        "patients": query
            .all_patient_snapshots()
            .iter()
            .map(|s| serde_json::to_value(&**s))
            .collect::<Result<Vec<_>, _>>()?,
        "providers": query
            .all_provider_snapshots()
            .iter()
            .map(|s| serde_json::to_value(&**s))
            .collect::<Result<Vec<_>, _>>()?,
        "facilities": query
            .all_facility_snapshots()
            .iter()
            .map(|s| serde_json::to_value(&**s))
            .collect::<Result<Vec<_>, _>>()?,
    });
    std::fs::write(path, serde_json::to_string_pretty(&document)?)?;
    Ok(())
}
