//! Config command

use anyhow::Result;
use camino::Utf8Path;
use recur_core::RecurConfig;

use crate::cli::ConfigCommands;
use crate::output;

pub fn run(cmd: ConfigCommands, config: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show { json } => show(json, config),
        ConfigCommands::Validate => validate(config),
    }
}

fn show(json: bool, path: Option<&Utf8Path>) -> Result<()> {
    let config = RecurConfig::load(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", config.to_yaml()?);
    }

    Ok(())
}

fn validate(path: Option<&Utf8Path>) -> Result<()> {
    let config = RecurConfig::load(path)?;

    match &config.config_path {
        Some(path) => output::success(&format!("Configuration is valid: {}", path)),
        None => output::success("No configuration file found, using defaults"),
    }

    let default = config.retry.default_policy()?;
    output::kv("Default max retries", &default.max_retry_count().to_string());
    output::kv(
        "Default max delay",
        &format!("{}ms", default.max_retry_delay().as_millis()),
    );

    if !config.retry.operations.is_empty() {
        let names: Vec<&str> = config.retry.operations.keys().map(String::as_str).collect();
        output::kv("Operations", &names.join(", "));
    }

    Ok(())
}
