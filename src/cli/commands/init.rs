//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "meridian.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Meridian configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        match fs::write(&self.output, Self::sample_config()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Validate configuration: meridian validate-config");
                println!("  3. Run an ingest: meridian ingest --input events.jsonl");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate the sample configuration
    fn sample_config() -> &'static str {
        r#"# Meridian Configuration File
# Patient Journey Analytics Pipeline

[application]
log_level = "info"

[pipeline]
# Stays longer than this take the long-stay quality penalty
stay_threshold_hours = 168.0
# Day-count thresholds classifying readmission links, ascending
readmission_windows = [30, 90]
# Quality-score penalty per recorded complication
complication_penalty_weight = 0.5
# Patients processed concurrently; each patient stays single-writer
parallel_patients = 4

[snapshots]
# Staleness bound: snapshots are at most this many seconds behind
refresh_interval_seconds = 300
# Trailing window for provider and facility snapshots
window_days = 30
# Bounded retry budget for a snapshot refresh
max_retries = 3
retry_backoff_ms = [250, 500, 1000]

[ingest]
# Tag applied when a source declares no system of origin
source_system = "batch_import"
dead_letter_path = "meridian_deadletter.jsonl"
max_retries = 3

[audit]
path = "meridian_audit.jsonl"
actor = "meridian-pipeline"

[logging]
local_enabled = false
local_path = "logs"
local_rotation = "daily"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeridianConfig;

    #[test]
    fn test_sample_config_parses_and_validates() {
        let config: MeridianConfig = toml::from_str(InitArgs::sample_config()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingest.source_system, "batch_import");
    }
}
