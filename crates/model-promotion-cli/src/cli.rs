//! Command line arguments

use clap::{Parser, ValueEnum};
use model_promotion_core::Environment;
use model_promotion_service::{DEFAULT_CONFIG_ROOT, DEFAULT_TRACKING_URI};
use std::path::PathBuf;
use std::time::Duration;

/// Environment argument; only these three values are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnvArg {
    Dev,
    Pre,
    Pro,
}

impl From<EnvArg> for Environment {
    fn from(arg: EnvArg) -> Self {
        match arg {
            EnvArg::Dev => Environment::Dev,
            EnvArg::Pre => Environment::Pre,
            EnvArg::Pro => Environment::Pro,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "promote")]
#[command(version)]
#[command(about = "Promote model versions to baseline in the MLflow registry from config files")]
pub struct Cli {
    /// Environment to promote. Example: promote pro
    #[arg(value_enum)]
    pub env: EnvArg,

    /// Directory holding one sub-directory of JSON config files per environment
    #[arg(long, env = "PROMOTION_CONFIG_DIR", default_value = DEFAULT_CONFIG_ROOT)]
    pub config_dir: PathBuf,

    /// MLflow tracking server
    #[arg(long, env = "MLFLOW_TRACKING_URI", default_value = DEFAULT_TRACKING_URI)]
    pub tracking_uri: String,

    /// Bearer token for the tracking server
    #[arg(long, env = "MLFLOW_TRACKING_TOKEN", hide_env_values = true)]
    pub tracking_token: Option<String>,

    /// Write a JSON audit report of every promotion to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Seconds to wait between assigning the alias and verifying it
    #[arg(long, default_value_t = 5)]
    pub propagation_delay_secs: u64,

    /// Per-request timeout against the tracking server, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Copy `model_description` onto the promoted version
    #[arg(long)]
    pub apply_description: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn environment(&self) -> Environment {
        self.env.into()
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_secs(self.propagation_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
