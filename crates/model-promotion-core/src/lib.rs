//! Core types for baseline model promotion
//!
//! This crate holds the data model shared by the promotion orchestrator and
//! its adapters: the validated promotion request, the registry contract and
//! its closed error set, promotion failures with their rollback plan, and
//! the per-run audit trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;

// Re-exports for convenience
pub use audit::{AuditRecorder, AuditTrail, RunId, StepId, StepRecord, StepStatus};
pub use config::{InvalidPromotionConfig, PromotionConfig, PromotionConfigFile};
pub use error::{PromotionFailure, PromotionSnapshot, RollbackPlan};
pub use registry::{RegistryClient, RegistryError, RegistryResult};
pub use types::{
    is_challenger_alias, Environment, ModelName, ModelVersionRef, PromotionOutcome, TargetAlias,
    BASELINE_ALIAS, CHALLENGER_ALIAS_PREFIX,
};

#[cfg(any(test, feature = "mocks"))]
pub use registry::MockRegistryClient;
