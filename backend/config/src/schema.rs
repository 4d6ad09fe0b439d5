//! fundsync configuration schema.
//!
//! Typed for serde YAML/JSON deserialization. Every section has working
//! defaults except the credentials and identifiers that belong to a
//! particular deployment.

use std::collections::BTreeMap;

use fundsync_core::MatchStrategy;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_DIR: &str = "public";
/// 10 MiB upload cap.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_OCR_PATH: &str = "/api/ocr";
pub const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_REDIRECT_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com";
pub const DEFAULT_NOTION_VERSION: &str = "2025-09-03";
pub const DEFAULT_LEDGER_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_LOG_LEVEL: &str = "info";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FundSyncConfig {
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
    pub ledger: LedgerConfig,
    pub matching: MatchingConfig,
    pub logging: LoggingConfig,
}

/// Whether the proxy API key is present, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyStatus {
    pub configured: bool,
    pub reason: String,
}

impl FundSyncConfig {
    pub fn api_key_status(&self) -> ApiKeyStatus {
        match self.extraction.api_key.as_deref() {
            Some(key) if !key.is_empty() => ApiKeyStatus {
                configured: true,
                reason: "API key is configured".to_string(),
            },
            _ => ApiKeyStatus {
                configured: false,
                reason: "API key is not configured; set API_KEY in the environment".to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP front door
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Directory of static assets served as the router fallback.
    pub public_dir: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            public_dir: DEFAULT_PUBLIC_DIR.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction proxy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionConfig {
    /// Base URL of the OCR/LLM proxy, e.g. `https://proxy.example.com`.
    pub proxy_url: String,
    pub ocr_path: String,
    /// Forwarded as `x-api-key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Forwarded as `x-vercel-protection-bypass`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass_secret: Option<String>,
    /// Sent verbatim on every extraction request.
    pub extra_headers: BTreeMap<String, String>,
    pub timeout_secs: u64,
    pub redirect_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            proxy_url: String::new(),
            ocr_path: DEFAULT_OCR_PATH.to_string(),
            api_key: None,
            bypass_secret: None,
            extra_headers: BTreeMap::new(),
            timeout_secs: DEFAULT_EXTRACTION_TIMEOUT_SECS,
            redirect_timeout_secs: DEFAULT_REDIRECT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger store (Notion)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerConfig {
    pub base_url: String,
    pub notion_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Database receiving the new return records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_database_id: Option<String>,
    /// Data source listing the known funds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fund_data_source_id: Option<String>,
    pub timeout_secs: u64,
    pub properties: LedgerProperties,
    /// Select option written for return movements.
    pub return_label: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOTION_BASE_URL.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            token: None,
            records_database_id: None,
            fund_data_source_id: None,
            timeout_secs: DEFAULT_LEDGER_TIMEOUT_SECS,
            properties: LedgerProperties::default(),
            return_label: "收益".to_string(),
        }
    }
}

/// Property names of the Notion databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerProperties {
    /// Title property holding a fund's display name.
    pub fund_name: String,
    pub title: String,
    pub fund_relation: String,
    pub amount: String,
    pub movement: String,
    pub date: String,
}

impl Default for LedgerProperties {
    fn default() -> Self {
        Self {
            fund_name: "基金名称".to_string(),
            title: "操作日期".to_string(),
            fund_relation: "基金信息".to_string(),
            amount: "变动金额(+/-)".to_string(),
            movement: "仓位变化类型".to_string(),
            date: "日期".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Matching / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchingConfig {
    pub strategy: MatchStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit console logs as JSON lines.
    pub json: bool,
    /// When set, also write daily-rolling NDJSON files here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
extraction:
  proxyUrl: https://proxy.example.com
  timeoutSecs: 10
matching:
  strategy: longest
"#;
        let cfg: FundSyncConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.extraction.proxy_url, "https://proxy.example.com");
        assert_eq!(cfg.extraction.timeout_secs, 10);
        assert_eq!(cfg.extraction.redirect_timeout_secs, DEFAULT_REDIRECT_TIMEOUT_SECS);
        assert_eq!(cfg.extraction.ocr_path, "/api/ocr");
        assert_eq!(cfg.matching.strategy, MatchStrategy::Longest);
        assert_eq!(cfg.server.port, DEFAULT_PORT);
        assert_eq!(cfg.ledger.properties.fund_name, "基金名称");
    }

    #[test]
    fn api_key_status_reflects_presence() {
        let mut cfg = FundSyncConfig::default();
        assert!(!cfg.api_key_status().configured);
        cfg.extraction.api_key = Some(String::new());
        assert!(!cfg.api_key_status().configured);
        cfg.extraction.api_key = Some("k-123".into());
        assert!(cfg.api_key_status().configured);
    }
}
