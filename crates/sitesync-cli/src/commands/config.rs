//! Config command - View and validate configuration

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;
use sitesync_core::config::Config;
use tracing::info;

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Check the configuration file for errors
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => show(ctx),
            ConfigCommand::Validate => validate(ctx),
            ConfigCommand::Path => {
                let formatter = ctx.formatter();
                if ctx.is_json() {
                    formatter.print_json(&json!({
                        "config_path": ctx.config_path.display().to_string(),
                        "exists": ctx.config_path.exists(),
                    }));
                } else {
                    println!("{}", ctx.config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn show(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config = ctx.load_config();

    if ctx.is_json() {
        let value = serde_json::to_value(&config).context("Failed to serialize configuration")?;
        formatter.print_json(&value);
        return Ok(());
    }

    if !ctx.config_path.exists() {
        formatter.info(&format!(
            "No file at {}; showing defaults",
            ctx.config_path.display()
        ));
    }
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    for line in yaml.lines() {
        formatter.info(line);
    }
    Ok(())
}

fn validate(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config_path = &ctx.config_path;

    let config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {}", e)
            } else {
                "Configuration file not found. Using defaults.".to_string()
            };
            if ctx.is_json() {
                formatter.print_json(&json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else if config_path.exists() {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info("Using default configuration.");
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if ctx.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    Ok(())
}
