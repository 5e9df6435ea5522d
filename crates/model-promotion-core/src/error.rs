//! Promotion failure types
//!
//! A promotion either succeeds, is a no-op, or ends in a
//! [`PromotionFailure`]. Verification failure is the only failure raised
//! after the registry has been mutated; it carries the state the registry
//! was in before the attempt and the manual rollback instructions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::ModelVersionRef;

/// Registry state captured before any mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionSnapshot {
    /// Version holding the target alias before the attempt, if any
    pub baseline: Option<ModelVersionRef>,
    /// Record of the version being promoted, if it could be read
    pub candidate: Option<ModelVersionRef>,
}

/// Manual instructions for restoring the pre-promotion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub model_name: String,
    pub alias: String,
    pub steps: Vec<String>,
}

impl RollbackPlan {
    /// Derive the rollback steps from the pre-promotion snapshot.
    pub fn from_snapshot(model_name: &str, alias: &str, snapshot: &PromotionSnapshot) -> Self {
        let mut steps = Vec::new();

        match &snapshot.baseline {
            Some(baseline) => steps.push(format!(
                "Make sure the `{}` alias of model `{}` points to version `{}` ({})",
                alias, model_name, baseline.version, baseline
            )),
            None => steps.push(format!(
                "Model `{}` had no `{}` alias before this promotion: remove the alias if it is now set",
                model_name, alias
            )),
        }

        match &snapshot.candidate {
            Some(candidate) if candidate.aliases.is_empty() => steps.push(format!(
                "Make sure version `{}` of model `{}` carries no aliases ({})",
                candidate.version, model_name, candidate
            )),
            Some(candidate) => steps.push(format!(
                "Make sure version `{}` of model `{}` carries the aliases {:?} ({})",
                candidate.version, model_name, candidate.aliases, candidate
            )),
            None => steps.push(format!(
                "The promoted version of model `{}` could not be read before the attempt: \
                 check its aliases in the registry history",
                model_name
            )),
        }

        steps.push(
            "Re-run the promotion pipeline to restart the promotion process".to_string(),
        );

        Self {
            model_name: model_name.to_string(),
            alias: alias.to_string(),
            steps,
        }
    }
}

impl fmt::Display for RollbackPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ROLLBACK INSTRUCTIONS: go to the model registry and manually roll back:"
        )?;
        for step in &self.steps {
            writeln!(f, " - {}", step)?;
        }
        Ok(())
    }
}

/// Fatal promotion failure
#[derive(Error, Debug, Clone)]
pub enum PromotionFailure {
    /// The requested version does not exist; nothing was changed.
    #[error("Version `{version}` of model `{model_name}` does not exist in the registry: {detail}")]
    UnknownVersion {
        model_name: String,
        version: String,
        detail: String,
    },

    /// The registry does not reflect the requested promotion after the write.
    #[error("Promotion verification failed: {message}")]
    VerificationFailed {
        message: String,
        snapshot: PromotionSnapshot,
        rollback: RollbackPlan,
    },
}

impl PromotionFailure {
    /// Rollback instructions, when the registry may have been mutated.
    pub fn rollback(&self) -> Option<&RollbackPlan> {
        match self {
            PromotionFailure::VerificationFailed { rollback, .. } => Some(rollback),
            PromotionFailure::UnknownVersion { .. } => None,
        }
    }
}
