//! Config Loader Adapter
//!
//! Discovers the promotion config files of an environment and turns each of
//! them into a validated [`PromotionConfig`]. Files live under
//! `<root>/<env>/*.json`; the default root is [`DEFAULT_CONFIG_ROOT`].

use model_promotion_core::{Environment, PromotionConfig, PromotionConfigFile};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Default directory holding one sub-directory of config files per environment
pub const DEFAULT_CONFIG_ROOT: &str = "deploy/models/config";

/// Errors from loading promotion configs
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid configuration format in {path}: {source}")]
    InvalidFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration validation failed for {path}: {reason}")]
    ValidationFailed { path: PathBuf, reason: String },
}

/// Result type for config loading operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Loads promotion configs from the config tree
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the config files of one environment
    pub fn environment_dir(&self, env: Environment) -> PathBuf {
        self.root.join(env.as_str())
    }

    /// List the JSON config files of an environment, sorted by path.
    ///
    /// A missing environment directory is not an error: there is simply
    /// nothing to promote.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn discover(&self, env: Environment) -> ConfigResult<Vec<PathBuf>> {
        let dir = self.environment_dir(env);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "No config directory for environment");
                return Ok(Vec::new());
            }
            Err(source) => return Err(ConfigError::Io { path: dir, source }),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_json = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if is_json && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        debug!(count = paths.len(), dir = %dir.display(), "Discovered config files");
        Ok(paths)
    }

    /// Read, parse and validate one config file.
    #[instrument(skip(self))]
    pub fn load(&self, path: &Path) -> ConfigResult<PromotionConfig> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    /// Load one config file and check it against the environment it was
    /// discovered under. A mismatch is reported but not rejected.
    pub fn load_for(&self, env: Environment, path: &Path) -> ConfigResult<PromotionConfig> {
        let config = self.load(path)?;
        if config.environment() != env {
            warn!(
                path = %path.display(),
                declared = %config.environment(),
                running = %env,
                "Config declares a different environment than the one being promoted"
            );
        }
        Ok(config)
    }

    fn parse(path: &Path, raw: &str) -> ConfigResult<PromotionConfig> {
        let file: PromotionConfigFile =
            serde_json::from_str(raw).map_err(|source| ConfigError::InvalidFormat {
                path: path.to_path_buf(),
                source,
            })?;

        PromotionConfig::try_from(file).map_err(|e| ConfigError::ValidationFailed {
            path: path.to_path_buf(),
            reason: e.0,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_ROOT)
    }
}
