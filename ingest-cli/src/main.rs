//! Command line entry point of the ingester.
//!
//! Loads a JSON dataset, merges it into the production schema with a single writer session
//! and prints the transfer report.

use clap::Parser;
use ingest_telemetry::tracing::init_tracing;
use std::process::ExitCode;
use std::sync::Once;
use tracing::error;

use crate::args::Args;
use crate::core::{load_ingest_config, run};

mod args;
mod core;

static INIT_CRYPTO: Once = Once::new();

fn install_crypto_provider() {
    INIT_CRYPTO.call_once(|| {
        if rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .is_err()
        {
            error!("a rustls crypto provider was already installed");
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_ingest_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load the configuration: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let working_dir = config.writer.resolved_working_dir();
    let _log_flusher = match init_tracing(env!("CARGO_BIN_NAME"), &working_dir) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            return ExitCode::FAILURE;
        }
    };

    install_crypto_provider();

    if let Err(err) = run(args, config, &working_dir).await {
        error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
