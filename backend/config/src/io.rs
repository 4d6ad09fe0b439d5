//! Config file discovery and reading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "fundsync.yaml";

/// Resolve which config file to read.
/// Priority: explicit path > `FUNDSYNC_CONFIG` env > `./fundsync.yaml`.
pub fn config_file_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("FUNDSYNC_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Read the YAML config file as a JSON value tree.
///
/// A missing file is not an error: the deployment may be configured through
/// the environment alone, so an empty object is returned.
pub async fn load_raw_config(path: &Path) -> Result<Value> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let value: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    // An empty YAML document parses as null.
    Ok(match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    })
}
