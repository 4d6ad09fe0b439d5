//! Environment handling for config values.
//!
//! Two passes run at load time:
//! - `${VAR_NAME}` references inside string values of the config file are
//!   substituted (`$${VAR}` keeps a literal `${VAR}`);
//! - well-known variables (`PROXY_SERVER_URL`, `NOTION_TOKEN`, ...) override
//!   individual fields after the file is parsed.

use std::collections::HashMap;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::schema::FundSyncConfig;

/// `${VAR}` or the escaped form `$${VAR}`; group 1 is the extra `$`.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Snapshot of the process environment.
pub fn process_env() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Substitute `${VAR}` references in every string leaf of `value`.
///
/// Fails on the first variable that is unset or empty.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let child = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                out.insert(k.clone(), substitute_value(v, env, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let out = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(out.into_owned())
}

/// Apply the well-known environment overrides on top of a parsed config.
///
/// Empty values are ignored so an exported-but-blank variable never wipes a
/// value from the config file.
pub fn apply_env_overrides(mut config: FundSyncConfig, env: &HashMap<String, String>) -> FundSyncConfig {
    let get = |key: &str| env.get(key).filter(|v| !v.trim().is_empty()).cloned();

    if let Some(bind) = get("FUNDSYNC_BIND") {
        config.server.bind_address = bind;
    }
    if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }
    if let Some(dir) = get("FUNDSYNC_PUBLIC_DIR") {
        config.server.public_dir = dir;
    }

    if let Some(url) = get("PROXY_SERVER_URL") {
        config.extraction.proxy_url = url;
    }
    if let Some(key) = get("API_KEY") {
        config.extraction.api_key = Some(key);
    }
    if let Some(secret) = get("PROXY_BYPASS_SECRET") {
        config.extraction.bypass_secret = Some(secret);
    }

    if let Some(token) = get("NOTION_TOKEN") {
        config.ledger.token = Some(token);
    }
    if let Some(id) = get("NOTION_DATABASE_ID") {
        config.ledger.records_database_id = Some(id);
    }
    if let Some(id) = get("NOTION_FUND_DATABASE_ID") {
        config.ledger.fund_data_source_id = Some(id);
    }

    if let Some(level) = get("RUST_LOG") {
        config.logging.level = level;
    }
    if let Some(dir) = get("FUNDSYNC_LOG_DIR") {
        config.logging.dir = Some(dir);
    }

    config
}
