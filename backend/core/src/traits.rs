use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;

use crate::error::{DirectoryError, ExtractionError, WriteError};
use crate::types::{EntityPage, ExtractedBatch, NewLedgerRecord};

/// Turns a statement image into structured fund records.
#[async_trait]
pub trait StatementExtractor: Send + Sync {
    /// Run one extraction. Implementations own their retry and deadline policy.
    async fn extract(&self, image: Bytes) -> Result<ExtractedBatch, ExtractionError>;
}

/// The two ledger operations the pipeline needs.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Query every page of the fund collection, in store order.
    async fn query_entities(&self) -> Result<Vec<EntityPage>, DirectoryError>;

    /// Create one record and return its identifier.
    async fn create_record(&self, record: &NewLedgerRecord) -> Result<String, WriteError>;
}

/// Source of "today". Injected so year defaults and fallback titles are testable.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the process's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock frozen at one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
