//! Promotion run over every config file of an environment

use anyhow::{Context, Result};
use model_promotion_core::{AuditRecorder, AuditTrail, PromotionOutcome, RegistryClient};
use model_promotion_service::{
    BaselinePromoter, ConfigLoader, MlflowRegistryClient, MlflowSettings, PromoterSettings,
};
use secrecy::SecretString;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::cli::Cli;

/// One entry of the audit report
#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PromotionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail: Option<AuditTrail>,
}

/// Build the MLflow client from the command line and run the promotions.
pub async fn run(cli: &Cli) -> Result<Vec<ReportEntry>> {
    let mut settings = MlflowSettings::new(&cli.tracking_uri)
        .with_context(|| format!("invalid tracking URI `{}`", cli.tracking_uri))?
        .with_timeout(cli.timeout());
    if let Some(token) = &cli.tracking_token {
        settings = settings.with_token(SecretString::new(token.clone()));
    }
    let client = MlflowRegistryClient::new(settings).context("failed to build registry client")?;
    info!(tracking_uri = %client.tracking_uri(), "Using MLflow registry");

    run_with_client(cli, Arc::new(client)).await
}

/// Promote every config file of the selected environment, in path order.
///
/// Stops at the first config that fails to load or to promote. The report,
/// when requested, is written in every case.
pub async fn run_with_client(
    cli: &Cli,
    client: Arc<dyn RegistryClient>,
) -> Result<Vec<ReportEntry>> {
    let env = cli.environment();
    let loader = ConfigLoader::new(&cli.config_dir);
    let promoter = BaselinePromoter::new(client, env).with_settings(PromoterSettings {
        propagation_delay: cli.propagation_delay(),
        apply_description: cli.apply_description,
    });

    let paths = loader
        .discover(env)
        .with_context(|| format!("failed to list config files for `{}`", env))?;
    if paths.is_empty() {
        info!(dir = %loader.environment_dir(env).display(), "No config files to promote");
    }

    let mut entries = Vec::with_capacity(paths.len());
    let mut failure = None;

    for path in &paths {
        info!("Start processing content of config file: {}", path.display());
        let config_path = path.display().to_string();

        let config = match loader.load_for(env, path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                entries.push(ReportEntry {
                    config_path,
                    outcome: None,
                    error: Some(e.to_string()),
                    trail: None,
                });
                failure = Some(anyhow::Error::new(e));
                break;
            }
        };

        let recorder = AuditRecorder::new(
            config.model_name().as_str(),
            config.model_version(),
            env.as_str(),
        );
        let result = promoter.promote_recorded(&config, &recorder).await;
        let trail = Some(recorder.finalize());

        match result {
            Ok(outcome) => entries.push(ReportEntry {
                config_path,
                outcome: Some(outcome),
                error: None,
                trail,
            }),
            Err(e) => {
                let mut message = e.to_string();
                if let Some(rollback) = e.rollback() {
                    message = format!("{}\n{}", message, rollback);
                }
                entries.push(ReportEntry {
                    config_path: config_path.clone(),
                    outcome: None,
                    error: Some(message),
                    trail,
                });
                failure = Some(anyhow::Error::new(e).context(format!(
                    "promotion from {} failed",
                    config_path
                )));
                break;
            }
        }
    }

    let written = match &cli.report {
        Some(report) => write_report(report, &entries),
        None => Ok(()),
    };

    // a promotion failure outranks a report failure
    match (failure, written) {
        (Some(e), Ok(())) => Err(e),
        (Some(e), Err(report_error)) => {
            error!("{:#}", report_error);
            Err(e.context(format!("report not written: {:#}", report_error)))
        }
        (None, Err(report_error)) => Err(report_error),
        (None, Ok(())) => Ok(entries),
    }
}

fn write_report(path: &Path, entries: &[ReportEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).context("failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("failed to write report {}", path.display()))?;
    info!(path = %path.display(), "Wrote promotion report");
    Ok(())
}
