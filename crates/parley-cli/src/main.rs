//! Parley command-line interface
//!
//! Evaluates a model on one or more tasks and prints the aggregated report.
//!
//! ```bash
//! parley eval -t integration_tests --metrics all -n 10
//! parley eval -t integration_tests,integration_tests:multiturnCandidate \
//!     --num-epochs 0.5 --aggregate-micro --log-every-n-examples 50
//! RUST_LOG=debug parley eval --display-examples -n 5
//! ```

mod args;
mod commands;

use anyhow::Result;
use clap::Parser;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with environment-based filtering
    // Set RUST_LOG=debug for verbose logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Eval(args) => commands::eval::run(args).await,
        Commands::List => {
            commands::eval::list();
            Ok(())
        }
    }
}
