//! Baseline promotion service
//!
//! The [`BaselinePromoter`] orchestrator together with the adapters it runs
//! against: the MLflow registry client, the config file loader and an
//! in-memory registry.

pub mod adapters;
pub mod promoter;

pub use adapters::{
    ConfigError, ConfigLoader, ConfigResult, InMemoryRegistry, MlflowRegistryClient,
    MlflowSettings, RegistryCall, RegistryOperation, DEFAULT_CONFIG_ROOT, DEFAULT_TRACKING_URI,
};
pub use promoter::{BaselinePromoter, PromoterSettings, DEFAULT_PROPAGATION_DELAY};
