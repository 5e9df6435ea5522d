//! Adapters around the promotion orchestrator
//!
//! This module provides:
//! - Config Loader: discovery and validation of per-environment promotion config files
//! - MLflow: the registry contract over the MLflow REST API
//! - Memory: an in-process registry with the same contract, for tests and rehearsals

pub mod config_loader;
pub mod memory;
pub mod mlflow;

// Re-export adapter types for convenience
pub use config_loader::{ConfigError, ConfigLoader, ConfigResult, DEFAULT_CONFIG_ROOT};
pub use memory::{InMemoryRegistry, RegistryCall, RegistryOperation};
pub use mlflow::{MlflowRegistryClient, MlflowSettings, DEFAULT_TRACKING_URI};
