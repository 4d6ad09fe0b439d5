//! The one call the front door makes: image in, report out.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info};

use fundsync_core::{
    ExtractedFund, PipelineError, ReconciliationOutcome, ReconciliationSummary, StatementExtractor,
};
use fundsync_ledger::EntityDirectory;

use crate::engine::{Reconciliation, ReconciliationEngine};

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub raw_text: String,
    pub date: Option<String>,
    pub funds: Vec<ExtractedFund>,
    #[serde(rename = "notionResults")]
    pub outcomes: Vec<ReconciliationOutcome>,
    #[serde(rename = "notionSummary")]
    pub summary: ReconciliationSummary,
}

/// Response envelope shared by the HTTP route and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PipelineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessResponse {
    pub fn ok(report: PipelineReport) -> Self {
        Self {
            success: true,
            data: Some(report),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Extraction, then the directory snapshot, then reconciliation.
pub struct Pipeline {
    extractor: Arc<dyn StatementExtractor>,
    directory: EntityDirectory,
    engine: ReconciliationEngine,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn StatementExtractor>,
        directory: EntityDirectory,
        engine: ReconciliationEngine,
    ) -> Self {
        Self {
            extractor,
            directory,
            engine,
        }
    }

    pub async fn run(&self, image: Bytes) -> Result<PipelineReport, PipelineError> {
        let start = Instant::now();
        let batch = self.extractor.extract(image).await?;
        info!(funds = batch.funds.len(), date = ?batch.date, "Statement extracted");

        let entities = self.directory.list_entities().await?;
        let Reconciliation { outcomes, summary } = self.engine.reconcile(&batch, &entities).await;

        info!(
            latency_ms = start.elapsed().as_millis() as u64,
            success = summary.success_count,
            total = summary.total,
            "Pipeline run complete"
        );

        Ok(PipelineReport {
            raw_text: batch.raw_text,
            date: batch.date,
            funds: batch.funds,
            outcomes,
            summary,
        })
    }

    /// Like [`Pipeline::run`], but abort errors become a failed response.
    pub async fn process_statement_image(&self, image: Bytes) -> ProcessResponse {
        match self.run(image).await {
            Ok(report) => ProcessResponse::ok(report),
            Err(e) => {
                error!(error = %e, "Pipeline run aborted");
                ProcessResponse::failed(format!("processing failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use fundsync_core::{
        DirectoryError, EntityPage, ExtractedBatch, ExtractionError, ExtractionErrorKind,
        FixedClock, LedgerStore, NewLedgerRecord, WriteError,
    };
    use serde_json::json;

    struct CannedExtractor(Result<ExtractedBatch, ExtractionError>);

    #[async_trait]
    impl StatementExtractor for CannedExtractor {
        async fn extract(&self, _image: Bytes) -> Result<ExtractedBatch, ExtractionError> {
            self.0.clone()
        }
    }

    struct CountingStore {
        pages: Option<Vec<EntityPage>>,
        queries: AtomicUsize,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new(pages: Option<Vec<EntityPage>>) -> Arc<Self> {
            Arc::new(Self {
                pages,
                queries: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LedgerStore for CountingStore {
        async fn query_entities(&self) -> Result<Vec<EntityPage>, DirectoryError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.pages.clone().ok_or_else(|| DirectoryError::Rejected {
                status: 404,
                code: "object_not_found".into(),
                message: "Could not find data source".into(),
            })
        }

        async fn create_record(&self, _record: &NewLedgerRecord) -> Result<String, WriteError> {
            let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("page-{n}"))
        }
    }

    fn pipeline(extractor: CannedExtractor, store: Arc<CountingStore>) -> Pipeline {
        let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()));
        Pipeline::new(
            Arc::new(extractor),
            EntityDirectory::new(store.clone(), "基金名称"),
            ReconciliationEngine::new(store, clock),
        )
    }

    fn batch() -> ExtractedBatch {
        ExtractedBatch {
            date: Some("2025年3月9日".into()),
            funds: vec![
                ExtractedFund::new("Alpha", "12.50"),
                ExtractedFund::new("Nobody", "1"),
            ],
            raw_text: "raw".into(),
        }
    }

    fn alpha_page() -> EntityPage {
        EntityPage {
            id: "f-a".into(),
            properties: json!({ "基金名称": { "title": [{ "plain_text": "Alpha Fund" }] } }),
        }
    }

    #[tokio::test]
    async fn successful_run_shapes_the_wire_report() {
        let store = CountingStore::new(Some(vec![alpha_page()]));
        let response = pipeline(CannedExtractor(Ok(batch())), store.clone())
            .process_statement_image(Bytes::from_static(b"img"))
            .await;

        assert!(response.success);
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["data"]["rawText"], "raw");
        assert_eq!(wire["data"]["date"], "2025年3月9日");
        assert_eq!(wire["data"]["funds"][0]["amount"], "12.50");
        assert_eq!(wire["data"]["notionResults"][0]["type"], "success");
        assert_eq!(wire["data"]["notionResults"][0]["notionPageId"], "page-1");
        assert_eq!(wire["data"]["notionResults"][1]["type"], "unmatched");
        assert_eq!(wire["data"]["notionSummary"]["success"], 1);
        assert_eq!(wire["data"]["notionSummary"]["unmatched"], 1);
        assert!(wire.get("error").is_none());
    }

    #[tokio::test]
    async fn directory_failure_aborts_without_writes() {
        let store = CountingStore::new(None);
        let response = pipeline(CannedExtractor(Ok(batch())), store.clone())
            .process_statement_image(Bytes::from_static(b"img"))
            .await;

        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        let message = response.error.unwrap();
        assert!(message.starts_with("processing failed: "));
        assert!(message.contains("object_not_found"));
    }

    #[tokio::test]
    async fn extraction_failure_skips_the_ledger_entirely() {
        let store = CountingStore::new(Some(vec![alpha_page()]));
        let failure = ExtractionError::new(ExtractionErrorKind::Timeout, "initial request aborted after 60000ms");
        let result = pipeline(CannedExtractor(Err(failure)), store.clone())
            .run(Bytes::from_static(b"img"))
            .await;

        assert!(matches!(result, Err(PipelineError::Extraction(ref e)) if e.kind == ExtractionErrorKind::Timeout));
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }
}
