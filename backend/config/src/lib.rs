//! `fundsync-config`: runtime configuration for the statement pipeline.
//!
//! Provides:
//! - Typed config schema (front door, extraction proxy, Notion ledger, logging)
//! - Optional YAML file with `${ENV_VAR}` substitution
//! - Environment overrides (`PORT`, `API_KEY`, `NOTION_TOKEN`, ...)
//! - Validation report and redaction for safe display

pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, process_env, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_file_path, load_raw_config};
pub use redact::redact;
pub use schema::{
    ApiKeyStatus, ExtractionConfig, FundSyncConfig, LedgerConfig, LedgerProperties,
    LoggingConfig, MatchingConfig, ServerConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Load the config file, substitute env vars, apply overrides, and validate.
///
/// This is the single entry point used at process start; the resulting
/// config is then passed by reference into every client constructor.
pub async fn load_and_prepare(
    path: &Path,
    env: &HashMap<String, String>,
) -> Result<(FundSyncConfig, ValidationReport)> {
    let raw = load_raw_config(path).await?;
    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;
    let config: FundSyncConfig =
        serde_json::from_value(value).context("Failed to deserialize config")?;
    let config = apply_env_overrides(config, env);
    let report = validate(&config);
    Ok((config, report))
}

impl FundSyncConfig {
    /// Display-safe JSON view of this config.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .map(|v| redact(&v))
            .unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_then_env_then_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fundsync.yaml");
        std::fs::write(
            &path,
            "extraction:\n  proxyUrl: https://proxy.example.com\n  apiKey: ${PROXY_KEY}\nledger:\n  recordsDatabaseId: db-file\n",
        )
        .unwrap();

        let env: HashMap<String, String> = [
            ("PROXY_KEY", "k-from-env"),
            ("NOTION_TOKEN", "secret_token"),
            ("NOTION_DATABASE_ID", "db-env"),
            ("NOTION_FUND_DATABASE_ID", "funds"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let (config, report) = load_and_prepare(&path, &env).await.unwrap();
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert_eq!(config.extraction.api_key.as_deref(), Some("k-from-env"));
        assert_eq!(config.ledger.records_database_id.as_deref(), Some("db-env"));

        let shown = config.redacted();
        assert!(!shown.to_string().contains("secret_token"));
    }

    #[tokio::test]
    async fn missing_substitution_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fundsync.yaml");
        std::fs::write(&path, "ledger:\n  token: ${NOT_SET_ANYWHERE}\n").unwrap();
        let err = load_and_prepare(&path, &HashMap::new()).await.unwrap_err();
        assert!(format!("{err:#}").contains("NOT_SET_ANYWHERE"));
    }
}
