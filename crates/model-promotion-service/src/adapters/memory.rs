//! In-memory registry
//!
//! A [`RegistryClient`] holding its state in process. It follows the same
//! contract as the MLflow adapter (one holder per alias, absent aliases and
//! versions reported as [`RegistryError::NotFound`]) and adds hooks for
//! exercising the orchestrator: injected failures, a call log and frozen
//! reads that mimic registry propagation lag.

use async_trait::async_trait;
use model_promotion_core::{ModelVersionRef, RegistryClient, RegistryError, RegistryResult};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Registry operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryOperation {
    GetVersionByAlias,
    GetVersion,
    SetAlias,
    DeleteAlias,
    UpdateDescription,
}

/// One call received by the registry, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    GetVersionByAlias { model: String, alias: String },
    GetVersion { model: String, version: String },
    SetAlias { model: String, alias: String, version: String },
    DeleteAlias { model: String, alias: String },
    UpdateDescription { model: String, version: String },
}

impl RegistryCall {
    /// Whether the call writes to the registry.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            RegistryCall::SetAlias { .. }
                | RegistryCall::DeleteAlias { .. }
                | RegistryCall::UpdateDescription { .. }
        )
    }
}

#[derive(Debug, Clone, Default)]
struct VersionEntry {
    aliases: Vec<String>,
    description: Option<String>,
}

type Models = BTreeMap<String, BTreeMap<String, VersionEntry>>;

#[derive(Debug, Default)]
struct MemoryState {
    models: Models,
    /// Read view served while reads are frozen
    frozen: Option<Models>,
    failures: HashMap<RegistryOperation, VecDeque<RegistryError>>,
    calls: Vec<RegistryCall>,
}

impl MemoryState {
    fn take_failure(&mut self, op: RegistryOperation) -> RegistryResult<()> {
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn read_view(&self) -> &Models {
        self.frozen.as_ref().unwrap_or(&self.models)
    }
}

fn to_ref(model: &str, version: &str, entry: &VersionEntry) -> ModelVersionRef {
    ModelVersionRef::new(model, version).with_aliases(entry.aliases.iter().cloned())
}

/// Registry kept in memory
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<MemoryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a version with the given aliases. Aliases already held by
    /// other versions of the model move to this one.
    pub fn with_version(self, model: &str, version: &str, aliases: &[&str]) -> Self {
        {
            let mut state = self.lock();
            let versions = state.models.entry(model.to_string()).or_default();
            for alias in aliases {
                for entry in versions.values_mut() {
                    entry.aliases.retain(|a| a != alias);
                }
            }
            let entry = versions.entry(version.to_string()).or_default();
            for alias in aliases {
                entry.aliases.push(alias.to_string());
            }
        }
        self
    }

    /// Fail the next call of `op` with `error`. Failures queue up per operation.
    pub fn fail_next(&self, op: RegistryOperation, error: RegistryError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Serve reads from the current state until [`Self::resume_reads`],
    /// as a registry whose read path lags its write path would.
    pub fn freeze_reads(&self) {
        let mut state = self.lock();
        state.frozen = Some(state.models.clone());
    }

    pub fn resume_reads(&self) {
        self.lock().frozen = None;
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.lock().calls.clone()
    }

    /// Calls that wrote to the registry, in order.
    pub fn mutations(&self) -> Vec<RegistryCall> {
        self.calls().into_iter().filter(RegistryCall::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current (unfrozen) aliases of a version.
    pub fn aliases_of(&self, model: &str, version: &str) -> Vec<String> {
        self.lock()
            .models
            .get(model)
            .and_then(|versions| versions.get(version))
            .map(|entry| entry.aliases.clone())
            .unwrap_or_default()
    }

    /// Current (unfrozen) holder of an alias.
    pub fn holder_of(&self, model: &str, alias: &str) -> Option<String> {
        let state = self.lock();
        state.models.get(model).and_then(|versions| {
            versions
                .iter()
                .find(|(_, entry)| entry.aliases.iter().any(|a| a == alias))
                .map(|(version, _)| version.clone())
        })
    }

    pub fn description_of(&self, model: &str, version: &str) -> Option<String> {
        self.lock()
            .models
            .get(model)
            .and_then(|versions| versions.get(version))
            .and_then(|entry| entry.description.clone())
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> RegistryResult<Option<ModelVersionRef>> {
        let mut state = self.lock();
        state.calls.push(RegistryCall::GetVersionByAlias {
            model: model_name.to_string(),
            alias: alias.to_string(),
        });
        state.take_failure(RegistryOperation::GetVersionByAlias)?;

        let found = state.read_view().get(model_name).and_then(|versions| {
            versions
                .iter()
                .find(|(_, entry)| entry.aliases.iter().any(|a| a == alias))
                .map(|(version, entry)| to_ref(model_name, version, entry))
        });
        debug!(model = %model_name, alias = %alias, found = found.is_some(), "Alias lookup");
        Ok(found)
    }

    async fn get_version(
        &self,
        model_name: &str,
        version: &str,
    ) -> RegistryResult<ModelVersionRef> {
        let mut state = self.lock();
        state.calls.push(RegistryCall::GetVersion {
            model: model_name.to_string(),
            version: version.to_string(),
        });
        state.take_failure(RegistryOperation::GetVersion)?;

        state
            .read_view()
            .get(model_name)
            .and_then(|versions| versions.get(version))
            .map(|entry| to_ref(model_name, version, entry))
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "Model version (name={}, version={}) not found",
                    model_name, version
                ))
            })
    }

    async fn set_alias(&self, model_name: &str, alias: &str, version: &str) -> RegistryResult<()> {
        let mut state = self.lock();
        state.calls.push(RegistryCall::SetAlias {
            model: model_name.to_string(),
            alias: alias.to_string(),
            version: version.to_string(),
        });
        state.take_failure(RegistryOperation::SetAlias)?;

        let versions = state.models.get_mut(model_name).ok_or_else(|| {
            RegistryError::NotFound(format!("Registered model `{}` not found", model_name))
        })?;
        if !versions.contains_key(version) {
            return Err(RegistryError::NotFound(format!(
                "Model version (name={}, version={}) not found",
                model_name, version
            )));
        }

        for entry in versions.values_mut() {
            entry.aliases.retain(|a| a != alias);
        }
        if let Some(entry) = versions.get_mut(version) {
            entry.aliases.push(alias.to_string());
        }
        Ok(())
    }

    async fn delete_alias(&self, model_name: &str, alias: &str) -> RegistryResult<()> {
        let mut state = self.lock();
        state.calls.push(RegistryCall::DeleteAlias {
            model: model_name.to_string(),
            alias: alias.to_string(),
        });
        state.take_failure(RegistryOperation::DeleteAlias)?;

        let holder = state.models.get_mut(model_name).and_then(|versions| {
            versions
                .values_mut()
                .find(|entry| entry.aliases.iter().any(|a| a == alias))
        });
        match holder {
            Some(entry) => {
                entry.aliases.retain(|a| a != alias);
                Ok(())
            }
            None => Err(RegistryError::NotFound(format!(
                "Registered model alias {} not found on model {}",
                alias, model_name
            ))),
        }
    }

    async fn update_description(
        &self,
        model_name: &str,
        version: &str,
        description: &str,
    ) -> RegistryResult<()> {
        let mut state = self.lock();
        state.calls.push(RegistryCall::UpdateDescription {
            model: model_name.to_string(),
            version: version.to_string(),
        });
        state.take_failure(RegistryOperation::UpdateDescription)?;

        let entry = state
            .models
            .get_mut(model_name)
            .and_then(|versions| versions.get_mut(version))
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "Model version (name={}, version={}) not found",
                    model_name, version
                ))
            })?;
        entry.description = Some(description.to_string());
        Ok(())
    }
}
