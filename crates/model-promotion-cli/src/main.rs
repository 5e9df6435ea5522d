//! `promote` - move model versions to baseline from config files
//!
//! Triggered by CI when a data scientist changes a model config file:
//!
//! ```text
//! promote dev
//! ```
//!
//! Every `deploy/models/config/<env>/*.json` file is promoted in turn. Any
//! failure exits non-zero so the pipeline is marked failed.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

mod cli;
mod logging;
mod run;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.log_format);

    info!(env = %cli.environment(), config_dir = %cli.config_dir.display(), "Starting model promotion");

    match run::run(&cli).await {
        Ok(entries) => {
            info!(promoted = entries.len(), "Model promotion finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
