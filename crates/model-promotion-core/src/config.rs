//! Promotion request
//!
//! A [`PromotionConfig`] describes one promotion: which version of which
//! registered model becomes the baseline on which environment. It is
//! built once from a validated [`PromotionConfigFile`] and never changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Environment, ModelName, TargetAlias};

/// Rejected promotion request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid promotion config: {0}")]
pub struct InvalidPromotionConfig(pub String);

/// Promotion request as authored in a JSON config file.
///
/// Field names follow the files data scientists edit under
/// `deploy/models/config/<env>/`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionConfigFile {
    pub model_version: String,
    pub model_env: Environment,
    pub model_name: ModelName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_description: Option<String>,
    #[serde(default)]
    pub model_alias: TargetAlias,
}

/// Validated, immutable promotion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PromotionConfigFile", into = "PromotionConfigFile")]
pub struct PromotionConfig {
    model_name: ModelName,
    model_version: String,
    environment: Environment,
    target_alias: TargetAlias,
    description: Option<String>,
}

impl PromotionConfig {
    /// Build a config for promoting `model_version` of `model_name` to baseline.
    pub fn new(
        model_name: ModelName,
        model_version: impl Into<String>,
        environment: Environment,
    ) -> Result<Self, InvalidPromotionConfig> {
        Self::try_from(PromotionConfigFile {
            model_version: model_version.into(),
            model_env: environment,
            model_name,
            model_description: None,
            model_alias: TargetAlias::Baseline,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn model_name(&self) -> ModelName {
        self.model_name
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn target_alias(&self) -> TargetAlias {
        self.target_alias
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl TryFrom<PromotionConfigFile> for PromotionConfig {
    type Error = InvalidPromotionConfig;

    fn try_from(file: PromotionConfigFile) -> Result<Self, Self::Error> {
        let model_version = file.model_version.trim().to_string();
        if model_version.is_empty() {
            return Err(InvalidPromotionConfig(
                "model_version must not be blank".to_string(),
            ));
        }

        let description = file
            .model_description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            model_name: file.model_name,
            model_version,
            environment: file.model_env,
            target_alias: file.model_alias,
            description,
        })
    }
}

impl From<PromotionConfig> for PromotionConfigFile {
    fn from(config: PromotionConfig) -> Self {
        Self {
            model_version: config.model_version,
            model_env: config.environment,
            model_name: config.model_name,
            model_description: config.description,
            model_alias: config.target_alias,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "model_version": "1",
            "model_env": "dev",
            "model_name": "ad_enrichment",
            "model_description": "Test model",
            "model_alias": "baseline"
        }"#;

        let config: PromotionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.model_version(), "1");
        assert_eq!(config.environment(), Environment::Dev);
        assert_eq!(config.model_name(), ModelName::AdEnrichment);
        assert_eq!(config.target_alias(), TargetAlias::Baseline);
        assert_eq!(config.description(), Some("Test model"));
    }

    #[test]
    fn test_alias_and_description_are_optional() {
        let json = r#"{"model_version": "7", "model_env": "pro", "model_name": "sellers_embeddings"}"#;

        let config: PromotionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.target_alias(), TargetAlias::Baseline);
        assert_eq!(config.description(), None);
    }

    #[test]
    fn test_invalid_environment_rejected() {
        let json = r#"{"model_version": "1", "model_env": "invalid_env", "model_name": "ad_enrichment"}"#;
        assert!(serde_json::from_str::<PromotionConfig>(json).is_err());
    }

    #[test]
    fn test_non_baseline_alias_rejected() {
        let json = r#"{"model_version": "1", "model_env": "dev", "model_name": "ad_enrichment", "model_alias": "challenger_ar"}"#;
        assert!(serde_json::from_str::<PromotionConfig>(json).is_err());
    }

    #[test]
    fn test_numeric_version_rejected() {
        let json = r#"{"model_version": 3, "model_env": "dev", "model_name": "ad_enrichment"}"#;
        assert!(serde_json::from_str::<PromotionConfig>(json).is_err());
    }

    #[test]
    fn test_blank_version_rejected() {
        let err = PromotionConfig::new(ModelName::AdEnrichment, "  ", Environment::Dev).unwrap_err();
        assert!(err.to_string().contains("model_version"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"model_version": "2", "model_env": "pre", "model_name": "buyers_embeddings", "owner": "ds-team"}"#;
        let config: PromotionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.model_version(), "2");
    }
}
