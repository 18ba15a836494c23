use anyhow::Result;
use clap::Parser;
use mongo_api_core::ClientConfig;
use mongo_api_rs::MongoApiClient;
use std::process::ExitCode;

mod cli;
mod telemetry;

fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();

    // Load configuration
    let loaded = ClientConfig::load(&cli.config);
    let mut config = loaded.as_ref().cloned().unwrap_or_default();
    cli.apply_overrides(&mut config);

    let _guard = telemetry::init_telemetry(config.log_dir.as_deref())?;

    if let Err(e) = &loaded {
        tracing::warn!("Failed to load {}, using defaults: {}", cli.config, e);
    }
    tracing::info!("Connecting to {}", config.base_url());

    let mut client = MongoApiClient::new(config)?;
    let result = cli::run(cli.command, &mut client)?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.status() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
