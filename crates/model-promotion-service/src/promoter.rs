//! Baseline promotion orchestrator
//!
//! [`BaselinePromoter`] moves one model version to the `baseline` alias:
//!
//! 0. snapshot the current baseline holder and the candidate version
//! 1. stop early if the candidate already holds the alias
//! 2. remove the candidate's challenger aliases (failures only warn)
//! 3. point the alias at the candidate (a failure is judged at verification)
//! 4. wait for the registry read path to catch up
//! 5. verify: alias present, on the candidate, no challenger aliases left
//! 6. succeed, or fail with the snapshot and rollback instructions
//!
//! Every registry call is awaited before the next one is issued. Two
//! promoters racing on the same model are not coordinated.

use model_promotion_core::{
    AuditRecorder, Environment, ModelVersionRef, PromotionConfig, PromotionFailure,
    PromotionOutcome, PromotionSnapshot, RegistryClient, RegistryError, RollbackPlan, StepStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Step names recorded in the audit trail
pub mod steps {
    pub const SNAPSHOT: &str = "snapshot";
    pub const IDEMPOTENCY_CHECK: &str = "idempotency_check";
    pub const CHALLENGER_CLEANUP: &str = "challenger_cleanup";
    pub const ALIAS_REASSIGNMENT: &str = "alias_reassignment";
    pub const PROPAGATION_WAIT: &str = "propagation_wait";
    pub const VERIFICATION: &str = "verification";
    pub const DESCRIPTION_UPDATE: &str = "description_update";
}

/// Default pause between the alias write and its verification
pub const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_secs(5);

/// Tunables of a promotion run
#[derive(Debug, Clone)]
pub struct PromoterSettings {
    /// Fixed wait before verification
    pub propagation_delay: Duration,
    /// Write the config description onto the version after a verified promotion
    pub apply_description: bool,
}

impl Default for PromoterSettings {
    fn default() -> Self {
        Self {
            propagation_delay: DEFAULT_PROPAGATION_DELAY,
            apply_description: false,
        }
    }
}

/// Promotes model versions to baseline against one registry environment
pub struct BaselinePromoter {
    client: Arc<dyn RegistryClient>,
    environment: Environment,
    settings: PromoterSettings,
}

impl BaselinePromoter {
    pub fn new(client: Arc<dyn RegistryClient>, environment: Environment) -> Self {
        Self {
            client,
            environment,
            settings: PromoterSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PromoterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn settings(&self) -> &PromoterSettings {
        &self.settings
    }

    /// Promote the configured version to baseline.
    pub async fn promote(
        &self,
        config: &PromotionConfig,
    ) -> Result<PromotionOutcome, PromotionFailure> {
        let recorder = AuditRecorder::new(
            config.model_name().as_str(),
            config.model_version(),
            self.environment.as_str(),
        );
        self.promote_recorded(config, &recorder).await
    }

    /// Promote the configured version to baseline, recording each step.
    #[instrument(
        skip(self, config, recorder),
        fields(
            model = %config.model_name(),
            version = %config.model_version(),
            env = %self.environment,
            run_id = %recorder.run_id()
        )
    )]
    pub async fn promote_recorded(
        &self,
        config: &PromotionConfig,
        recorder: &AuditRecorder,
    ) -> Result<PromotionOutcome, PromotionFailure> {
        let model = config.model_name().as_str();
        let version = config.model_version();
        let alias = config.target_alias().as_str();

        let snapshot = self.capture_snapshot(model, version, alias, recorder).await?;

        if let Some(outcome) = self.check_already_promoted(model, version, alias, &snapshot, recorder) {
            return Ok(outcome);
        }

        self.remove_challenger_aliases(model, version, recorder).await;

        info!(
            "Promoting model `{}` version `{}` to `{}` on `{}` environment",
            model, version, alias, self.environment
        );
        let assignment = self.add_alias(model, version, alias, recorder).await;
        if assignment.succeeded {
            info!("{}", assignment.message);
        } else {
            error!("{}", assignment.message);
        }

        self.wait_for_propagation(recorder).await;

        let verification = self.verify(model, version, alias, recorder).await;
        if !verification.succeeded {
            let message = if assignment.succeeded {
                verification.message
            } else {
                format!("{} {}", assignment.message, verification.message)
            };
            let rollback = RollbackPlan::from_snapshot(model, alias, &snapshot);
            error!("{}", message);
            error!("{}", rollback);
            return Err(PromotionFailure::VerificationFailed {
                message,
                snapshot,
                rollback,
            });
        }

        info!(
            "Verified that model `{}` version `{}` holds the alias `{}`",
            model, version, alias
        );

        if self.settings.apply_description {
            if let Some(description) = config.description() {
                self.apply_description(model, version, description, recorder).await;
            }
        }

        Ok(verification)
    }

    /// Step 0: record the registry state before any mutation.
    ///
    /// Fails only when the candidate version is reported as absent.
    async fn capture_snapshot(
        &self,
        model: &str,
        version: &str,
        alias: &str,
        recorder: &AuditRecorder,
    ) -> Result<PromotionSnapshot, PromotionFailure> {
        let step = recorder.begin_step(steps::SNAPSHOT);

        let baseline = self.lookup_alias(model, alias).await;

        let candidate = match self.client.get_version(model, version).await {
            Ok(candidate) => Some(candidate),
            Err(RegistryError::NotFound(detail)) => {
                recorder.end_step(step, StepStatus::Failed, detail.clone());
                error!(model = %model, version = %version, "Version to promote does not exist");
                return Err(PromotionFailure::UnknownVersion {
                    model_name: model.to_string(),
                    version: version.to_string(),
                    detail,
                });
            }
            Err(e) => {
                warn!(model = %model, version = %version, error = %e, "Could not read the version to promote");
                None
            }
        };

        let snapshot = PromotionSnapshot {
            baseline,
            candidate,
        };
        recorder.annotate(
            step,
            "snapshot",
            serde_json::to_value(&snapshot).unwrap_or_default(),
        );
        recorder.end_step(step, StepStatus::Ok, "captured pre-promotion state");
        Ok(snapshot)
    }

    /// Alias lookup where any failure reads as "no holder".
    async fn lookup_alias(&self, model: &str, alias: &str) -> Option<ModelVersionRef> {
        match self.client.get_version_by_alias(model, alias).await {
            Ok(found) => found,
            Err(e) => {
                warn!(model = %model, alias = %alias, error = %e, "Alias lookup failed");
                None
            }
        }
    }

    /// Step 1: success without writes when the alias already points at the version.
    fn check_already_promoted(
        &self,
        model: &str,
        version: &str,
        alias: &str,
        snapshot: &PromotionSnapshot,
        recorder: &AuditRecorder,
    ) -> Option<PromotionOutcome> {
        let step = recorder.begin_step(steps::IDEMPOTENCY_CHECK);

        match &snapshot.baseline {
            Some(holder) if holder.version == version => {
                let message = format!(
                    "Alias `{}` of model `{}` already points to version `{}`. No changes needed.",
                    alias, model, version
                );
                info!("{}", message);
                recorder.end_step(step, StepStatus::Ok, message.clone());
                Some(PromotionOutcome::success(message))
            }
            Some(holder) => {
                recorder.end_step(
                    step,
                    StepStatus::Ok,
                    format!("alias `{}` currently on version `{}`", alias, holder.version),
                );
                None
            }
            None => {
                recorder.end_step(step, StepStatus::Ok, format!("alias `{}` not set", alias));
                None
            }
        }
    }

    /// Step 2: delete every challenger alias of the version, one at a time.
    async fn remove_challenger_aliases(
        &self,
        model: &str,
        version: &str,
        recorder: &AuditRecorder,
    ) {
        let step = recorder.begin_step(steps::CHALLENGER_CLEANUP);

        let candidate = match self.client.get_version(model, version).await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(
                    "Warning: could not read model `{}` version `{}` to remove its challenger aliases: {}",
                    model, version, e
                );
                recorder.end_step(step, StepStatus::Ok, format!("cleanup skipped: {}", e));
                return;
            }
        };

        let mut removed = Vec::new();
        let mut failed = Vec::new();
        for alias in candidate.challenger_aliases() {
            info!("Removing alias `{}` from model `{}` version `{}`", alias, model, version);
            let outcome = self.remove_alias(model, alias).await;
            if outcome.succeeded {
                info!("Alias `{}` was removed", alias);
                removed.push(alias.to_string());
            } else {
                warn!(
                    "Warning: failed to remove alias `{}` from model `{}` version `{}`: {}",
                    alias, model, version, outcome.message
                );
                failed.push(alias.to_string());
            }
        }

        recorder.annotate(step, "removed", serde_json::json!(removed));
        if !failed.is_empty() {
            recorder.annotate(step, "failed", serde_json::json!(failed));
        }
        recorder.end_step(
            step,
            StepStatus::Ok,
            format!("removed {} challenger alias(es), {} failed", removed.len(), failed.len()),
        );
    }

    async fn remove_alias(&self, model: &str, alias: &str) -> PromotionOutcome {
        match self.client.delete_alias(model, alias).await {
            Ok(()) => PromotionOutcome::success(format!(
                "Deleted alias `{}` from model `{}`",
                alias, model
            )),
            Err(e) => PromotionOutcome::failure(format!(
                "Failed to remove alias `{}` from model `{}`: {}",
                alias, model, e
            )),
        }
    }

    /// Step 3: point the alias at the version.
    async fn add_alias(
        &self,
        model: &str,
        version: &str,
        alias: &str,
        recorder: &AuditRecorder,
    ) -> PromotionOutcome {
        let step = recorder.begin_step(steps::ALIAS_REASSIGNMENT);

        let outcome = match self.client.set_alias(model, alias, version).await {
            Ok(()) => PromotionOutcome::success(format!(
                "Added alias `{}` to version `{}` of model `{}`",
                alias, version, model
            )),
            Err(e) => PromotionOutcome::failure(format!(
                "Failed to add alias `{}` to version `{}` of model `{}`: {}",
                alias, version, model, e
            )),
        };

        let status = if outcome.succeeded {
            StepStatus::Ok
        } else {
            StepStatus::Failed
        };
        recorder.end_step(step, status, outcome.message.clone());
        outcome
    }

    /// Step 4: one fixed pause; not a polling loop.
    async fn wait_for_propagation(&self, recorder: &AuditRecorder) {
        let step = recorder.begin_step(steps::PROPAGATION_WAIT);
        tokio::time::sleep(self.settings.propagation_delay).await;
        recorder.end_step(
            step,
            StepStatus::Ok,
            format!("waited {:?}", self.settings.propagation_delay),
        );
    }

    /// Step 5: the alias must exist, sit on the version, and the version
    /// must carry no challenger aliases.
    async fn verify(
        &self,
        model: &str,
        version: &str,
        alias: &str,
        recorder: &AuditRecorder,
    ) -> PromotionOutcome {
        let step = recorder.begin_step(steps::VERIFICATION);
        let context = format!(
            "model name: `{}`; model version: `{}`; model alias: `{}`",
            model, version, alias
        );

        let outcome = match self.client.get_version_by_alias(model, alias).await {
            Err(e) => PromotionOutcome::failure(format!(
                "Failed to look up the `{}` alias of model `{}`: {}. Please check: {}.",
                alias, model, e, context
            )),
            Ok(None) => PromotionOutcome::failure(format!(
                "No `{}` alias found on the registry for model `{}`. Please check: {}.",
                alias, model, context
            )),
            Ok(Some(found)) if found.version != version => PromotionOutcome::failure(format!(
                "The `{}` alias of model `{}` is held by version `{}`, expected `{}`. Please check: {}.",
                alias, model, found.version, version, context
            )),
            Ok(Some(found)) => {
                let challengers = found.challenger_aliases();
                if challengers.is_empty() {
                    PromotionOutcome::success(format!(
                        "Verified that the `{}` alias has the correct version. {}",
                        alias, context
                    ))
                } else {
                    PromotionOutcome::failure(format!(
                        "Version `{}` of model `{}` still has challenger aliases: {:?}. Please check: {}.",
                        version, model, challengers, context
                    ))
                }
            }
        };

        let status = if outcome.succeeded {
            StepStatus::Ok
        } else {
            StepStatus::Failed
        };
        recorder.end_step(step, status, outcome.message.clone());
        outcome
    }

    /// Copy the config description onto the version. Failures only warn.
    async fn apply_description(
        &self,
        model: &str,
        version: &str,
        description: &str,
        recorder: &AuditRecorder,
    ) {
        let step = recorder.begin_step(steps::DESCRIPTION_UPDATE);
        match self.client.update_description(model, version, description).await {
            Ok(()) => {
                info!("Updated description of model `{}` version `{}`", model, version);
                recorder.end_step(step, StepStatus::Ok, "description updated");
            }
            Err(e) => {
                warn!(
                    "Warning: failed to update the description of model `{}` version `{}`: {}",
                    model, version, e
                );
                recorder.end_step(step, StepStatus::Failed, e.to_string());
            }
        }
    }
}
