//! Configuration schema types
//!
//! This module defines the configuration structure for the pipeline. Every
//! recognized option maps to a TOML key; defaults follow the clinical
//! conventions of the source data (168-hour long-stay threshold, 30/90-day
//! readmission windows).

use serde::{Deserialize, Serialize};

/// Main Meridian configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeridianConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Pipeline derivation settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Aggregate snapshot settings
    #[serde(default)]
    pub snapshots: SnapshotConfig,

    /// Ingestion settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Audit trail settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MeridianConfig {
    /// Loads and validates configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::domain::Result<Self> {
        super::loader::load_config(path)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.pipeline.validate()?;
        self.snapshots.validate()?;
        self.ingest.validate()?;
        self.audit.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Default for MeridianConfig {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            pipeline: PipelineConfig::default(),
            snapshots: SnapshotConfig::default(),
            ingest: IngestConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Metric derivation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Length-of-stay threshold (hours) above which the quality score takes
    /// the long-stay penalty
    #[serde(default = "default_stay_threshold_hours")]
    pub stay_threshold_hours: f64,

    /// Readmission window thresholds in days, ascending; conventionally
    /// [30, 90]
    #[serde(default = "default_readmission_windows")]
    pub readmission_windows: Vec<u32>,

    /// Quality-score penalty per recorded complication
    #[serde(default = "default_complication_penalty_weight")]
    pub complication_penalty_weight: f64,

    /// Maximum number of patients processed concurrently
    #[serde(default = "default_parallel_patients")]
    pub parallel_patients: usize,
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.stay_threshold_hours <= 0.0 {
            return Err("stay_threshold_hours must be positive".to_string());
        }
        if self.readmission_windows.is_empty() {
            return Err("readmission_windows must not be empty".to_string());
        }
        if self.readmission_windows.windows(2).any(|w| w[0] >= w[1]) {
            return Err("readmission_windows must be strictly ascending".to_string());
        }
        if self.complication_penalty_weight < 0.0 {
            return Err("complication_penalty_weight must not be negative".to_string());
        }
        if self.parallel_patients == 0 {
            return Err("parallel_patients must be at least 1".to_string());
        }
        Ok(())
    }

    /// Returns the (short, long) readmission windows used for link
    /// classification; the first and last configured thresholds.
    pub fn window_pair(&self) -> (u32, u32) {
        let short = self.readmission_windows.first().copied().unwrap_or(30);
        let long = self.readmission_windows.last().copied().unwrap_or(90);
        (short, long)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stay_threshold_hours: default_stay_threshold_hours(),
            readmission_windows: default_readmission_windows(),
            complication_penalty_weight: default_complication_penalty_weight(),
            parallel_patients: default_parallel_patients(),
        }
    }
}

/// Aggregate materializer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Staleness bound: consumers may read a snapshot at most this many
    /// seconds behind the latest derived state
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,

    /// Trailing window for provider and facility snapshots, in days
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Bounded retry budget for a snapshot refresh
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff schedule between refresh retries, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: Vec<u64>,
}

impl SnapshotConfig {
    fn validate(&self) -> Result<(), String> {
        if self.refresh_interval_seconds == 0 {
            return Err("refresh_interval_seconds must be positive".to_string());
        }
        if self.window_days == 0 {
            return Err("window_days must be positive".to_string());
        }
        if self.max_retries == 0 || self.max_retries > 10 {
            return Err("max_retries must be between 1 and 10".to_string());
        }
        Ok(())
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: default_refresh_interval_seconds(),
            window_days: default_window_days(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Source-system tag applied when the source declares none
    #[serde(default = "default_source_system")]
    pub source_system: String,

    /// Path of the JSON-lines dead-letter sink
    #[serde(default = "default_dead_letter_path")]
    pub dead_letter_path: String,

    /// Bounded retry budget for dead-letter pushes
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl IngestConfig {
    fn validate(&self) -> Result<(), String> {
        if self.source_system.trim().is_empty() {
            return Err("source_system must not be empty".to_string());
        }
        if self.dead_letter_path.trim().is_empty() {
            return Err("dead_letter_path must not be empty".to_string());
        }
        if self.max_retries == 0 || self.max_retries > 10 {
            return Err("max_retries must be between 1 and 10".to_string());
        }
        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_system: default_source_system(),
            dead_letter_path: default_dead_letter_path(),
            max_retries: default_max_retries(),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Path of the JSON-lines audit sink
    #[serde(default = "default_audit_path")]
    pub path: String,

    /// Actor identity stamped on records produced by this service
    #[serde(default = "default_actor")]
    pub actor: String,
}

impl AuditConfig {
    fn validate(&self) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("audit path must not be empty".to_string());
        }
        if self.actor.trim().is_empty() {
            return Err("audit actor must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
            actor: default_actor(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether to write JSON logs to a local rolling file
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for rolling log files
    #[serde(default = "default_log_path")]
    pub local_path: String,

    /// Rotation cadence: "daily" or "hourly"
    #[serde(default = "default_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("local_path must be set when local logging is enabled".to_string());
        }
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_log_path(),
            local_rotation: default_rotation(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stay_threshold_hours() -> f64 {
    168.0
}

fn default_readmission_windows() -> Vec<u32> {
    vec![30, 90]
}

fn default_complication_penalty_weight() -> f64 {
    0.5
}

fn default_parallel_patients() -> usize {
    4
}

fn default_refresh_interval_seconds() -> u64 {
    300
}

fn default_window_days() -> u32 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_backoff_ms() -> Vec<u64> {
    vec![250, 500, 1000]
}

fn default_source_system() -> String {
    "unknown".to_string()
}

fn default_dead_letter_path() -> String {
    "meridian_deadletter.jsonl".to_string()
}

fn default_audit_path() -> String {
    "meridian_audit.jsonl".to_string()
}

fn default_actor() -> String {
    "meridian-pipeline".to_string()
}

fn default_log_path() -> String {
    "logs".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MeridianConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.stay_threshold_hours, 168.0);
        assert_eq!(config.pipeline.readmission_windows, vec![30, 90]);
        assert_eq!(config.pipeline.window_pair(), (30, 90));
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = MeridianConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unordered_windows_rejected() {
        let mut config = MeridianConfig::default();
        config.pipeline.readmission_windows = vec![90, 30];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_parallel_patients_rejected() {
        let mut config = MeridianConfig::default();
        config.pipeline.parallel_patients = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_budget_bounded() {
        let mut config = MeridianConfig::default();
        config.snapshots.max_retries = 0;
        assert!(config.validate().is_err());
        config.snapshots.max_retries = 11;
        assert!(config.validate().is_err());
        config.snapshots.max_retries = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rotation_validation() {
        let mut config = MeridianConfig::default();
        config.logging.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
