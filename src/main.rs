//! objectseeker - command-line front end.
//!
//! Looks up Azure AD object IDs through Microsoft Graph using the Azure CLI session.

#![deny(clippy::all)]

mod cli;

use clap::Parser;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use objectseeker::{Config, SearchError};

fn main() -> ExitCode {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only warn if it exists but could not be read
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let cli = cli::Cli::parse();

    let config = match Config::load_from(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging.level);
    debug!("objectseeker v{} starting", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::run(cli, config)) {
        Ok(code) => code,
        Err(e) => {
            debug!("Command failed: {:?}", e);
            let message = match e.downcast_ref::<SearchError>() {
                Some(search) => search.user_message(),
                None => format!("{:#}", e),
            };
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}
