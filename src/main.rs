mod credentials;
mod location;
mod session;
mod sink;
mod web;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::credentials::DeploymentOutputs;
use crate::location::parse_coordinates;
use crate::web::config::{LocationConfig, SinkConfig};
use crate::web::Config;

#[derive(Parser)]
#[command(name = "geobeacon")]
#[command(about = "Self-hosted location tracking beacon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file
    Validate { config: String },
    /// Run the beacon service
    Serve { config: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Serve { config } => serve(&config).await,
    }
}

fn validate(path: &str) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let LocationConfig::Fixed { coordinates } = &config.location {
        if parse_coordinates(coordinates).is_none() {
            eprintln!("Invalid fixed coordinates: {}", coordinates);
            return ExitCode::FAILURE;
        }
    }

    println!("Config is valid");
    match &config.location {
        LocationConfig::Agent {
            url,
            timeout,
            high_accuracy,
        } => println!(
            "  location: agent {} (timeout {}, high accuracy {})",
            url,
            humantime::format_duration(*timeout),
            high_accuracy
        ),
        LocationConfig::Fixed { coordinates } => println!("  location: fixed @ {}", coordinates),
    }
    match &config.sink {
        SinkConfig::Topic {
            endpoint,
            topic_prefix,
        } => println!("  sink: topic publish to {} (prefix {})", endpoint, topic_prefix),
        SinkConfig::Records { endpoint } => println!("  sink: record store at {}", endpoint),
    }
    println!(
        "  period: {}",
        humantime::format_duration(config.session.period)
    );
    println!("  web bind: {}", config.web.bind);
    println!("  api keys: {}", config.api_keys.len());

    match DeploymentOutputs::from_file(&config.auth.outputs_file) {
        Ok(outputs) => println!(
            "  identity pool: {} ({})",
            outputs.auth.identity_pool_id, outputs.auth.region
        ),
        Err(e) => println!(
            "  outputs artifact not readable ({}); server would start disconnected",
            e
        ),
    }

    ExitCode::SUCCESS
}

async fn serve(path: &str) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match web::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
