//! Model registry contract
//!
//! The promotion orchestrator talks to the remote registry only through
//! [`RegistryClient`]. Implementations must uphold the registry's
//! at-most-one-holder rule: setting an alias on a version detaches it from
//! whichever version held it before.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::ModelVersionRef;

/// Errors reported by a registry call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The alias or version does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),
    /// Connection, protocol or server-side failure
    #[error("Registry transport error: {0}")]
    Transport(String),
    /// Credentials rejected or insufficient
    #[error("Registry permission denied: {0}")]
    PermissionDenied(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Capability interface over a remote model registry.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Version currently holding `alias`; `Ok(None)` when no version holds it.
    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> RegistryResult<Option<ModelVersionRef>>;

    /// Full record of one version. Fails with [`RegistryError::NotFound`]
    /// when the version does not exist.
    async fn get_version(&self, model_name: &str, version: &str)
        -> RegistryResult<ModelVersionRef>;

    /// Point `alias` at `version`, detaching it from any previous holder.
    async fn set_alias(&self, model_name: &str, alias: &str, version: &str) -> RegistryResult<()>;

    /// Remove `alias` from the model. Fails when the alias is absent.
    async fn delete_alias(&self, model_name: &str, alias: &str) -> RegistryResult<()>;

    /// Replace the free-text description of a version.
    async fn update_description(
        &self,
        model_name: &str,
        version: &str,
        description: &str,
    ) -> RegistryResult<()>;
}
