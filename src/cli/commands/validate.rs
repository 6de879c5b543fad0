//! Validate-config command implementation

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Print the resolved configuration after validation
    #[arg(long)]
    pub show: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        println!("🔍 Validating configuration: {config_path}");
        println!();

        match load_config(config_path) {
            Ok(config) => {
                println!("✅ Configuration is valid");
                if self.show {
                    println!();
                    println!("{}", toml::to_string_pretty(&config)?);
                }
                Ok(0)
            }
            Err(e) => {
                eprintln!("❌ Configuration validation failed: {e}");
                Ok(2) // Configuration error exit code
            }
        }
    }
}
