//! Config redaction: produce display-safe snapshots by masking secrets.
//!
//! Used for the `/health` payload and the startup log line.

use serde_json::Value;

/// Keys whose string values are always masked.
static SENSITIVE_KEYS: &[&str] = &[
    "apiKey",
    "api_key",
    "bypassSecret",
    "bypass_secret",
    "token",
    "secret",
    "password",
];

/// Keys whose whole subtree is masked (header values may carry credentials).
static SENSITIVE_SUBTREES: &[&str] = &["extraHeaders"];

/// Redact a config JSON value, replacing sensitive strings with a short hint.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "", false)
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn mask(s: &str) -> Value {
    if s.is_empty() {
        return Value::String(String::new());
    }
    // Show at most the first 4 chars, never more than a third of the secret.
    let shown = (s.chars().count() / 3).min(4);
    let prefix: String = s.chars().take(shown).collect();
    Value::String(format!("{prefix}***"))
}

fn redact_recursive(value: &Value, key: &str, forced: bool) -> Value {
    match value {
        Value::String(s) if forced || is_sensitive_key(key) => mask(s),
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|v| redact_recursive(v, key, forced))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let forced = forced || SENSITIVE_SUBTREES.contains(&k.as_str());
                out.insert(k.clone(), redact_recursive(v, k, forced));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_credentials() {
        let v = json!({
            "extraction": { "apiKey": "k-abcdef123456", "bypassSecret": "gzAlcWhz4m95" },
            "ledger": { "token": "secret_abcdefghijkl" }
        });
        let redacted = redact(&v);
        let key = redacted["extraction"]["apiKey"].as_str().unwrap();
        assert!(key.ends_with("***"));
        assert!(!key.contains("abcdef"));
        assert!(redacted["extraction"]["bypassSecret"].as_str().unwrap().ends_with("***"));
        assert!(!redacted["ledger"]["token"].as_str().unwrap().contains("abcdefghijkl"));
    }

    #[test]
    fn masks_every_extra_header() {
        let v = json!({ "extraHeaders": { "x-team": "team-token-value" } });
        let redacted = redact(&v);
        assert!(redacted["extraHeaders"]["x-team"].as_str().unwrap().ends_with("***"));
    }

    #[test]
    fn passthrough_non_sensitive() {
        let v = json!({ "ledger": { "recordsDatabaseId": "db-1" }, "logging": { "level": "debug" } });
        let redacted = redact(&v);
        assert_eq!(redacted["ledger"]["recordsDatabaseId"], "db-1");
        assert_eq!(redacted["logging"]["level"], "debug");
    }
}
