//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::MeridianConfig;
use crate::domain::errors::MeridianError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MeridianConfig
/// 4. Applies environment variable overrides (MERIDIAN_* prefix)
/// 5. Validates the configuration
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use meridian::config::load_config;
///
/// let config = load_config("meridian.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MeridianConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MeridianError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MeridianError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: MeridianConfig = toml::from_str(&contents)
        .map_err(|e| MeridianError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        MeridianError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are passed through untouched so documented examples don't
/// trip the missing-variable check.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MeridianError::Configuration(format!(
            "Missing environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies MERIDIAN_* environment variable overrides
///
/// Recognized overrides:
/// - `MERIDIAN_APPLICATION_LOG_LEVEL`
/// - `MERIDIAN_PIPELINE_STAY_THRESHOLD_HOURS`
/// - `MERIDIAN_PIPELINE_PARALLEL_PATIENTS`
/// - `MERIDIAN_SNAPSHOTS_REFRESH_INTERVAL_SECONDS`
/// - `MERIDIAN_INGEST_DEAD_LETTER_PATH`
/// - `MERIDIAN_AUDIT_PATH`
///
/// Unparseable numeric overrides are ignored with a warning rather than
/// failing the load; validation still runs on the final values.
fn apply_env_overrides(config: &mut MeridianConfig) {
    if let Ok(level) = std::env::var("MERIDIAN_APPLICATION_LOG_LEVEL") {
        config.application.log_level = level;
    }
    if let Ok(value) = std::env::var("MERIDIAN_PIPELINE_STAY_THRESHOLD_HOURS") {
        match value.parse::<f64>() {
            Ok(hours) => config.pipeline.stay_threshold_hours = hours,
            Err(_) => tracing::warn!(
                value = %value,
                "Ignoring unparseable MERIDIAN_PIPELINE_STAY_THRESHOLD_HOURS"
            ),
        }
    }
    if let Ok(value) = std::env::var("MERIDIAN_PIPELINE_PARALLEL_PATIENTS") {
        match value.parse::<usize>() {
            Ok(parallel) => config.pipeline.parallel_patients = parallel,
            Err(_) => tracing::warn!(
                value = %value,
                "Ignoring unparseable MERIDIAN_PIPELINE_PARALLEL_PATIENTS"
            ),
        }
    }
    if let Ok(value) = std::env::var("MERIDIAN_SNAPSHOTS_REFRESH_INTERVAL_SECONDS") {
        match value.parse::<u64>() {
            Ok(seconds) => config.snapshots.refresh_interval_seconds = seconds,
            Err(_) => tracing::warn!(
                value = %value,
                "Ignoring unparseable MERIDIAN_SNAPSHOTS_REFRESH_INTERVAL_SECONDS"
            ),
        }
    }
    if let Ok(path) = std::env::var("MERIDIAN_INGEST_DEAD_LETTER_PATH") {
        config.ingest.dead_letter_path = path;
    }
    if let Ok(path) = std::env::var("MERIDIAN_AUDIT_PATH") {
        config.audit.path = path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_known_variable() {
        std::env::set_var("MERIDIAN_TEST_DLQ", "/tmp/dlq.jsonl");
        let input = "dead_letter_path = \"${MERIDIAN_TEST_DLQ}\"\n";
        let output = substitute_env_vars(input).unwrap();
        assert!(output.contains("/tmp/dlq.jsonl"));
        std::env::remove_var("MERIDIAN_TEST_DLQ");
    }

    #[test]
    fn test_missing_variable_fails() {
        let input = "path = \"${MERIDIAN_TEST_DOES_NOT_EXIST}\"\n";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_comment_lines_skipped() {
        let input = "# example: path = \"${MERIDIAN_TEST_DOES_NOT_EXIST}\"\npath = \"x\"\n";
        let output = substitute_env_vars(input).unwrap();
        assert!(output.contains("MERIDIAN_TEST_DOES_NOT_EXIST"));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = load_config("/nonexistent/meridian.toml").unwrap_err();
        assert!(matches!(err, MeridianError::Configuration(_)));
    }
}
