//! `fundsync-reconcile`: turns an extracted statement into ledger records.

pub mod dates;
pub mod engine;
pub mod matcher;
pub mod pipeline;

pub use dates::{make_title, normalize};
pub use engine::{Reconciliation, ReconciliationEngine};
pub use matcher::{match_entity, match_with_strategy};
pub use pipeline::{Pipeline, PipelineReport, ProcessResponse};
