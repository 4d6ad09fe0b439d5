//! Config validation with field paths and user-friendly messages.

use thiserror::Error;
use url::Url;

use crate::schema::FundSyncConfig;

/// A config validation finding with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All findings from one validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// One line per error, for surfacing as a startup failure.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return every error and warning found.
pub fn validate(config: &FundSyncConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_extraction(config, &mut report);
    validate_ledger(config, &mut report);
    report
}

fn validate_server(config: &FundSyncConfig, report: &mut ValidationReport) {
    let server = &config.server;
    if server.port < 1024 && server.port != 80 && server.port != 443 {
        report.warn(
            "server.port",
            format!("Port {} requires elevated privileges; consider a port >= 1024", server.port),
        );
    }
    if server.max_upload_bytes == 0 {
        report.error("server.maxUploadBytes", "maxUploadBytes must be > 0");
    }
}

fn validate_extraction(config: &FundSyncConfig, report: &mut ValidationReport) {
    let ex = &config.extraction;
    if ex.proxy_url.trim().is_empty() {
        report.error("extraction.proxyUrl", "Proxy URL is required (set PROXY_SERVER_URL)");
    } else {
        match Url::parse(&ex.proxy_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => report.error(
                "extraction.proxyUrl",
                format!("Unsupported scheme '{}'; use http or https", url.scheme()),
            ),
            Err(e) => report.error("extraction.proxyUrl", format!("Invalid URL: {e}")),
        }
    }
    if !ex.ocr_path.starts_with('/') {
        report.error("extraction.ocrPath", "ocrPath must start with '/'");
    }
    if ex.timeout_secs == 0 {
        report.error("extraction.timeoutSecs", "timeoutSecs must be > 0");
    }
    if ex.redirect_timeout_secs == 0 {
        report.error("extraction.redirectTimeoutSecs", "redirectTimeoutSecs must be > 0");
    } else if ex.redirect_timeout_secs < ex.timeout_secs {
        report.warn(
            "extraction.redirectTimeoutSecs",
            "Redirected requests usually take longer; redirectTimeoutSecs is below timeoutSecs",
        );
    }
    if !config.api_key_status().configured {
        report.warn("extraction.apiKey", "No API key; statement uploads will be refused");
    }
}

fn validate_ledger(config: &FundSyncConfig, report: &mut ValidationReport) {
    let ledger = &config.ledger;
    let missing = |v: &Option<String>| v.as_deref().map(str::trim).map(str::is_empty).unwrap_or(true);

    if missing(&ledger.token) {
        report.error("ledger.token", "Notion token is required (set NOTION_TOKEN)");
    }
    if missing(&ledger.records_database_id) {
        report.error(
            "ledger.recordsDatabaseId",
            "Records database id is required (set NOTION_DATABASE_ID)",
        );
    }
    if missing(&ledger.fund_data_source_id) {
        report.error(
            "ledger.fundDataSourceId",
            "Fund data source id is required (set NOTION_FUND_DATABASE_ID)",
        );
    }
    if Url::parse(&ledger.base_url).is_err() {
        report.error("ledger.baseUrl", format!("Invalid URL '{}'", ledger.base_url));
    }
    if ledger.timeout_secs == 0 {
        report.error("ledger.timeoutSecs", "timeoutSecs must be > 0");
    }
    if ledger.return_label.trim().is_empty() {
        report.error("ledger.returnLabel", "returnLabel cannot be empty");
    }
}
