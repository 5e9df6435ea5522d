//! Promotion audit trail
//!
//! Every promotion run records the steps it went through, so that an
//! automation job leaves a machine-readable account of what it read and
//! wrote in the registry:
//!
//! ```text
//! Run (one per promotion request)
//!   ├─ snapshot
//!   ├─ idempotency_check
//!   ├─ challenger_cleanup
//!   ├─ alias_reassignment
//!   ├─ propagation_wait
//!   └─ verification
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use ulid::Ulid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a promotion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Ulid);

impl RunId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a RunId from its string representation.
    pub fn from_string(s: &str) -> Result<Self, String> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| format!("Invalid RunId: {}", e))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(Ulid);

impl StepId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Terminal status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Failed,
}

/// One recorded step of a promotion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: StepId,
    /// Step name, e.g. "challenger_cleanup"
    pub name: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: StepStatus,
    /// Human-readable result of the step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// The finalized record of one promotion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub run_id: RunId,
    pub model_name: String,
    pub model_version: String,
    pub environment: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: StepStatus,
    pub steps: Vec<StepRecord>,
}

impl AuditTrail {
    /// Look up the first step with the given name.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// Append-only, thread-safe step recorder scoped to a single promotion run.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    inner: Arc<Mutex<AuditRecorderInner>>,
}

#[derive(Debug)]
struct AuditRecorderInner {
    run_id: RunId,
    model_name: String,
    model_version: String,
    environment: String,
    started_at: DateTime<Utc>,
    steps: Vec<StepRecord>,
}

impl AuditRecorder {
    pub fn new(
        model_name: impl Into<String>,
        model_version: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AuditRecorderInner {
                run_id: RunId::new(),
                model_name: model_name.into(),
                model_version: model_version.into(),
                environment: environment.into(),
                started_at: Utc::now(),
                steps: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuditRecorderInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn run_id(&self) -> RunId {
        self.lock().run_id
    }

    /// Begin a new step. Returns its StepId.
    pub fn begin_step(&self, name: &str) -> StepId {
        let mut inner = self.lock();
        let step_id = StepId::new();
        inner.steps.push(StepRecord {
            step_id,
            name: name.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            status: StepStatus::Ok,
            detail: None,
            attributes: HashMap::new(),
        });
        step_id
    }

    /// Close a step with the given status and detail message.
    pub fn end_step(&self, step_id: StepId, status: StepStatus, detail: impl Into<String>) {
        let mut inner = self.lock();
        if let Some(step) = inner.steps.iter_mut().find(|s| s.step_id == step_id) {
            step.ended_at = Some(Utc::now());
            step.status = status;
            step.detail = Some(detail.into());
        }
    }

    /// Attach a structured attribute to a step.
    pub fn annotate(&self, step_id: StepId, key: &str, value: serde_json::Value) {
        let mut inner = self.lock();
        if let Some(step) = inner.steps.iter_mut().find(|s| s.step_id == step_id) {
            step.attributes.insert(key.to_string(), value);
        }
    }

    /// Finalize the run. The run is `Failed` if any step failed.
    pub fn finalize(&self) -> AuditTrail {
        let inner = self.lock();
        let any_failed = inner.steps.iter().any(|s| s.status == StepStatus::Failed);
        AuditTrail {
            run_id: inner.run_id,
            model_name: inner.model_name.clone(),
            model_version: inner.model_version.clone(),
            environment: inner.environment.clone(),
            started_at: inner.started_at,
            ended_at: Some(Utc::now()),
            status: if any_failed {
                StepStatus::Failed
            } else {
                StepStatus::Ok
            },
            steps: inner.steps.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> AuditRecorder {
        AuditRecorder::new("ad_enrichment", "3", "dev")
    }

    #[test]
    fn test_run_id_roundtrip() {
        let id = RunId::new();
        let parsed = RunId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(RunId::from_string("not-a-ulid").is_err());
    }

    #[test]
    fn test_empty_run_is_ok() {
        let trail = recorder().finalize();
        assert!(trail.steps.is_empty());
        assert_eq!(trail.status, StepStatus::Ok);
        assert_eq!(trail.model_version, "3");
        assert!(trail.ended_at.is_some());
    }

    #[test]
    fn test_step_lifecycle() {
        let recorder = recorder();
        let step = recorder.begin_step("idempotency_check");
        recorder.end_step(step, StepStatus::Ok, "no baseline yet");

        let trail = recorder.finalize();
        let record = trail.step("idempotency_check").unwrap();
        assert_eq!(record.status, StepStatus::Ok);
        assert_eq!(record.detail.as_deref(), Some("no baseline yet"));
        assert!(record.ended_at.is_some());
    }

    #[test]
    fn test_failed_step_fails_run() {
        let recorder = recorder();
        let ok = recorder.begin_step("challenger_cleanup");
        recorder.end_step(ok, StepStatus::Ok, "nothing to remove");
        let failed = recorder.begin_step("verification");
        recorder.end_step(failed, StepStatus::Failed, "wrong version");

        let trail = recorder.finalize();
        assert_eq!(trail.status, StepStatus::Failed);
        assert_eq!(trail.steps.len(), 2);
        assert_eq!(trail.steps[0].name, "challenger_cleanup");
    }

    #[test]
    fn test_annotate_and_serialize() {
        let recorder = recorder();
        let step = recorder.begin_step("challenger_cleanup");
        recorder.annotate(step, "removed", serde_json::json!(["challenger_ar"]));
        recorder.end_step(step, StepStatus::Ok, "removed 1 alias");

        let json = serde_json::to_string(&recorder.finalize()).unwrap();
        let parsed: AuditTrail = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.steps[0].attributes["removed"],
            serde_json::json!(["challenger_ar"])
        );
    }
}
