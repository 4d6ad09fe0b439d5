use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use fundsync_config::{LedgerConfig, LedgerProperties};
use fundsync_core::{DirectoryError, EntityPage, LedgerStore, MovementKind, NewLedgerRecord, WriteError};
use fundsync_logging::truncate_for_log;

/// Page size requested from the query endpoint (the API maximum).
const QUERY_PAGE_SIZE: u32 = 100;

/// Notion REST client for the fund directory and the records database.
pub struct NotionLedger {
    client: Client,
    base_url: String,
    token: String,
    notion_version: String,
    records_database_id: String,
    fund_data_source_id: String,
    properties: LedgerProperties,
    return_label: String,
}

impl NotionLedger {
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let token = required(&config.token, "ledger.token (NOTION_TOKEN)")?;
        let records_database_id =
            required(&config.records_database_id, "ledger.recordsDatabaseId (NOTION_DATABASE_ID)")?;
        let fund_data_source_id = required(
            &config.fund_data_source_id,
            "ledger.fundDataSourceId (NOTION_FUND_DATABASE_ID)",
        )?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Notion HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            notion_version: config.notion_version.clone(),
            records_database_id,
            fund_data_source_id,
            properties: config.properties.clone(),
            return_label: config.return_label.clone(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn movement_label(&self, movement: MovementKind) -> &str {
        match movement {
            MovementKind::Return => &self.return_label,
        }
    }

    /// Property map for a new record page.
    fn record_properties(&self, record: &NewLedgerRecord) -> Value {
        let p = &self.properties;
        let mut properties = serde_json::Map::new();
        properties.insert(
            p.title.clone(),
            json!({ "title": [{ "text": { "content": record.title } }] }),
        );
        properties.insert(
            p.fund_relation.clone(),
            json!({ "relation": [{ "id": record.entity_id }] }),
        );
        properties.insert(p.amount.clone(), json!({ "number": record.amount }));
        properties.insert(
            p.movement.clone(),
            json!({ "select": { "name": self.movement_label(record.movement) } }),
        );
        properties.insert(
            p.date.clone(),
            json!({ "date": { "start": record.date.format("%Y-%m-%d").to_string() } }),
        );
        Value::Object(properties)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, CallError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Notion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.notion_version)
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        if !status.is_success() {
            let error: NotionErrorBody = serde_json::from_str(&text).unwrap_or_default();
            return Err(CallError::Rejected {
                status: error.status.unwrap_or(status.as_u16()),
                code: error.code.unwrap_or_else(|| "unknown".to_string()),
                message: error.message.unwrap_or_else(|| truncate_for_log(&text)),
            });
        }

        serde_json::from_str(&text).map_err(|e| CallError::Decode(e.to_string()))
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .with_context(|| format!("{name} is not configured"))
}

/// Error payload of the Notion API.
#[derive(Debug, Default, Deserialize)]
struct NotionErrorBody {
    status: Option<u16>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    results: Vec<EntityPage>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

/// Failure of a single API call, before it is attributed to a read or a write.
#[derive(Debug)]
enum CallError {
    Transport(String),
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
    Decode(String),
}

impl From<CallError> for DirectoryError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Transport(m) => DirectoryError::Transport(m),
            CallError::Rejected {
                status,
                code,
                message,
            } => DirectoryError::Rejected {
                status,
                code,
                message,
            },
            CallError::Decode(m) => DirectoryError::Decode(m),
        }
    }
}

impl From<CallError> for WriteError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Transport(m) => WriteError::Transport(m),
            CallError::Rejected {
                status,
                code,
                message,
            } => WriteError::Rejected {
                status,
                code,
                message,
            },
            CallError::Decode(m) => WriteError::Decode(m),
        }
    }
}

#[async_trait]
impl LedgerStore for NotionLedger {
    async fn query_entities(&self) -> Result<Vec<EntityPage>, DirectoryError> {
        let start = Instant::now();
        let path = format!("/v1/data_sources/{}/query", self.fund_data_source_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
            if let Some(c) = &cursor {
                body["start_cursor"] = Value::String(c.clone());
            }

            let value = self.post(&path, &body).await?;
            let page: QueryPage =
                serde_json::from_value(value).map_err(|e| DirectoryError::Decode(e.to_string()))?;
            pages.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                (true, None) => {
                    warn!("Query reported more results without a cursor; stopping");
                    break;
                }
                (false, _) => break,
            }
        }

        info!(
            entities = pages.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Fetched fund directory from Notion"
        );
        Ok(pages)
    }

    async fn create_record(&self, record: &NewLedgerRecord) -> Result<String, WriteError> {
        if !record.amount.is_finite() {
            return Err(WriteError::InvalidAmount(record.amount));
        }

        let body = json!({
            "parent": { "database_id": self.records_database_id },
            "properties": self.record_properties(record),
        });

        let value = self.post("/v1/pages", &body).await?;
        let page: CreatedPage =
            serde_json::from_value(value).map_err(|e| WriteError::Decode(e.to_string()))?;

        debug!(page_id = %page.id, entity_id = %record.entity_id, "Created ledger record");
        Ok(page.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config() -> LedgerConfig {
        LedgerConfig {
            token: Some("secret_abc".into()),
            records_database_id: Some("records-db".into()),
            fund_data_source_id: Some("funds-ds".into()),
            ..Default::default()
        }
    }

    #[test]
    fn requires_credentials_and_ids() {
        let mut cfg = config();
        cfg.token = None;
        let err = NotionLedger::new(&cfg).err().unwrap();
        assert!(err.to_string().contains("NOTION_TOKEN"));

        let mut cfg = config();
        cfg.fund_data_source_id = Some(String::new());
        assert!(NotionLedger::new(&cfg).is_err());
    }

    #[test]
    fn record_properties_use_configured_names() {
        let ledger = NotionLedger::new(&config()).unwrap();
        let record = NewLedgerRecord {
            title: "@March 9, 2025".into(),
            entity_id: "fund-1".into(),
            amount: -3.5,
            movement: MovementKind::Return,
            date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
        };
        let props = ledger.record_properties(&record);
        assert_eq!(props["操作日期"]["title"][0]["text"]["content"], "@March 9, 2025");
        assert_eq!(props["基金信息"]["relation"][0]["id"], "fund-1");
        assert_eq!(props["变动金额(+/-)"]["number"], -3.5);
        assert_eq!(props["仓位变化类型"]["select"]["name"], "收益");
        assert_eq!(props["日期"]["date"]["start"], "2025-03-09");
    }

    #[tokio::test]
    async fn non_finite_amount_is_rejected_locally() {
        let ledger = NotionLedger::new(&config())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let record = NewLedgerRecord {
            title: "t".into(),
            entity_id: "fund-1".into(),
            amount: f64::NAN,
            movement: MovementKind::Return,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        };
        let err = ledger.create_record(&record).await.unwrap_err();
        assert!(matches!(err, WriteError::InvalidAmount(a) if a.is_nan()));
    }
}
