//! Journey command implementation
//!
//! Ingests the given event files and prints one patient's sequenced journey
//! with its readmission links as JSON. A quick way to inspect what the query
//! boundary would serve for a patient.

use crate::adapters::{JsonlAuditSink, JsonlDeadLetterSink, JsonlEventSource};
use crate::config::load_config;
use crate::core::PipelineCoordinator;
use crate::domain::PatientId;
use clap::Args;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the journey command
#[derive(Args, Debug)]
pub struct JourneyArgs {
    /// Raw event file(s) in JSON-lines format
    #[arg(short, long, required = true)]
    pub input: Vec<String>,

    /// Patient whose journey to print
    #[arg(short, long)]
    pub patient_id: String,

    /// Override the declared source-system tag
    #[arg(long)]
    pub source_system: Option<String>,
}

impl JourneyArgs {
    /// Execute the journey command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let patient_id = match PatientId::from_str(&self.patient_id) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("Invalid patient ID: {e}");
                return Ok(2);
            }
        };

        let config = load_config(config_path)?;
        let source_system = self
            .source_system
            .clone()
            .unwrap_or_else(|| config.ingest.source_system.clone());

        let dead_letter = Arc::new(JsonlDeadLetterSink::new(&config.ingest.dead_letter_path)?);
        let audit = Arc::new(JsonlAuditSink::new(&config.audit.path)?);
        let coordinator = PipelineCoordinator::new(config, dead_letter, audit);

        for input in &self.input {
            let mut source = JsonlEventSource::new(input, source_system.clone());
            let summary = coordinator.run(&mut source, shutdown_signal.clone()).await?;
            summary.log_summary();
        }

        let query = coordinator.query();
        let events = match query.journey(&patient_id).await {
            Ok(events) => events,
            Err(e) => {
                eprintln!("No journey for patient {patient_id}: {e}");
                return Ok(3); // Not-found exit code
            }
        };
        let links = query.readmission_links(&patient_id).await?;

        let document = serde_json::json!({
            "patient": query.patient(&patient_id),
            "journey": events,
            "readmission_links": links,
            "snapshot": query.patient_snapshot(&patient_id).map(|s| (*s).clone()),
        });
        println!("{}", serde_json::to_string_pretty(&document)?);

        Ok(0)
    }
}
