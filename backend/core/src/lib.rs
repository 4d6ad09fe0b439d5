pub mod error;
pub mod traits;
pub mod types;

pub use error::{DirectoryError, ExtractionError, ExtractionErrorKind, PipelineError, WriteError};
pub use traits::{Clock, FixedClock, LedgerStore, StatementExtractor, SystemClock};
pub use types::{
    CanonicalDate, EntityPage, ExtractedBatch, ExtractedFund, LedgerEntity, MatchStrategy,
    MovementKind, NewLedgerRecord, RawAmount, ReconciliationOutcome, ReconciliationSummary,
};
