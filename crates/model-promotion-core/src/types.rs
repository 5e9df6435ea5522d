//! Registry domain types
//!
//! Value types shared by the promotion orchestrator, the registry adapters
//! and the command line: deployment environments, the closed set of
//! registered models, registry version snapshots and step outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alias marking the production-serving version of a model.
pub const BASELINE_ALIAS: &str = "baseline";

/// Text identifying an A/B experiment alias (`challenger_ar`, `challenger_expX`, ...).
pub const CHALLENGER_ALIAS_PREFIX: &str = "challenger";

/// Returns `true` if the alias marks a challenger in an A/B experiment.
///
/// Matching is on containment, not on a strict prefix, so that aliases such
/// as `old_challenger_ar` are cleaned up as well.
pub fn is_challenger_alias(alias: &str) -> bool {
    alias.contains(CHALLENGER_ALIAS_PREFIX)
}

/// Registry environment a promotion runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Pre,
    Pro,
}

impl Environment {
    /// All environments, in promotion order.
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Pre, Environment::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Pre => "pre",
            Environment::Pro => "pro",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "pre" => Ok(Environment::Pre),
            "pro" => Ok(Environment::Pro),
            other => Err(format!(
                "unknown environment `{}`: allowed values are dev, pre, pro",
                other
            )),
        }
    }
}

/// Registered model names that may be promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelName {
    AdEnrichment,
    BuyersEmbeddings,
    SellersEmbeddings,
}

impl ModelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::AdEnrichment => "ad_enrichment",
            ModelName::BuyersEmbeddings => "buyers_embeddings",
            ModelName::SellersEmbeddings => "sellers_embeddings",
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The alias a promotion assigns. Only `baseline` exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetAlias {
    #[default]
    #[serde(rename = "baseline")]
    Baseline,
}

impl TargetAlias {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetAlias::Baseline => BASELINE_ALIAS,
        }
    }
}

impl fmt::Display for TargetAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a model version as reported by the registry.
///
/// Owned by the registry; a value of this type may already be stale when it
/// is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersionRef {
    /// Registered model name
    pub name: String,
    /// Version identifier
    pub version: String,
    /// Aliases currently attached, in registry order
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ModelVersionRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Challenger aliases attached to this version, in registry order.
    pub fn challenger_aliases(&self) -> Vec<&str> {
        self.aliases
            .iter()
            .map(String::as_str)
            .filter(|alias| is_challenger_alias(alias))
            .collect()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }
}

impl fmt::Display for ModelVersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name: `{}`, version: `{}`, aliases: {:?}",
            self.name, self.version, self.aliases
        )
    }
}

/// Result of a single registry-mutating step or of a whole promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub succeeded: bool,
    pub message: String,
}

impl PromotionOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}
