//! Shared fixtures for the cross-crate integration tests

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Registered model used by most scenarios
pub const MODEL: &str = "ad_enrichment";

/// Write a promotion config file under `<root>/<env>/<file_name>`.
pub fn write_config(
    root: &Path,
    env: &str,
    file_name: &str,
    config: &serde_json::Value,
) -> io::Result<PathBuf> {
    let dir = root.join(env);
    fs::create_dir_all(&dir)?;
    let path = dir.join(file_name);
    fs::write(&path, serde_json::to_string_pretty(config)?)?;
    Ok(path)
}

/// Config body promoting `version` of `model` on `env`.
pub fn promotion_config(model: &str, version: &str, env: &str) -> serde_json::Value {
    serde_json::json!({
        "model_version": version,
        "model_env": env,
        "model_name": model,
        "model_alias": "baseline"
    })
}
