use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use fundsync_core::{
    Clock, ExtractedBatch, ExtractedFund, LedgerEntity, LedgerStore, MatchStrategy, MovementKind,
    NewLedgerRecord, ReconciliationOutcome, ReconciliationSummary,
};

use crate::dates::{make_title, normalize};
use crate::matcher::match_with_strategy;

pub const UNMATCHED_ERROR: &str = "no matching fund found";
pub const ZERO_AMOUNT_REASON: &str = "zero amount";

/// Outcomes in input order, plus the run's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub outcomes: Vec<ReconciliationOutcome>,
    pub summary: ReconciliationSummary,
}

/// Writes one ledger record per matched, non-zero fund.
///
/// Funds are processed strictly one after another. A failed write becomes an
/// `Error` outcome and processing continues with the next fund.
pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    strategy: MatchStrategy,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            strategy: MatchStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub async fn reconcile(&self, batch: &ExtractedBatch, entities: &[LedgerEntity]) -> Reconciliation {
        let today = self.clock.today();
        let date = batch.date.as_deref().and_then(|d| normalize(d, today));
        let title = make_title(date, today);
        let record_date = date.map(|d| d.date()).unwrap_or(today);
        debug!(
            raw_date = ?batch.date,
            date = %record_date,
            title = %title,
            "Resolved statement date"
        );

        let mut outcomes = Vec::with_capacity(batch.funds.len());
        let mut summary = ReconciliationSummary::new(batch.funds.len());

        for fund in &batch.funds {
            let outcome = self.reconcile_fund(fund, entities, &title, record_date).await;
            match &outcome {
                ReconciliationOutcome::Success { .. } => summary.success_count += 1,
                ReconciliationOutcome::Skipped { .. } => summary.skipped_count += 1,
                ReconciliationOutcome::Unmatched { fund_name, .. } => {
                    summary.unmatched_count += 1;
                    summary
                        .error_messages
                        .push(format!("fund \"{fund_name}\" has no matching entry"));
                }
                ReconciliationOutcome::Error { fund_name, error, .. } => {
                    summary.failed_count += 1;
                    summary
                        .error_messages
                        .push(format!("fund \"{fund_name}\" write failed: {error}"));
                }
            }
            outcomes.push(outcome);
        }

        info!(
            total = summary.total,
            success = summary.success_count,
            failed = summary.failed_count,
            unmatched = summary.unmatched_count,
            skipped = summary.skipped_count,
            "Reconciliation finished"
        );

        Reconciliation { outcomes, summary }
    }

    async fn reconcile_fund(
        &self,
        fund: &ExtractedFund,
        entities: &[LedgerEntity],
        title: &str,
        date: chrono::NaiveDate,
    ) -> ReconciliationOutcome {
        let Some(entity) = match_with_strategy(&fund.name, entities, self.strategy) else {
            warn!(fund = %fund.name, "No matching fund in directory");
            return ReconciliationOutcome::Unmatched {
                fund_name: fund.name.clone(),
                amount: fund.amount.clone(),
                error: UNMATCHED_ERROR.to_string(),
            };
        };

        let amount = fund.amount.parse();
        if amount == 0.0 {
            debug!(fund = %fund.name, "Zero amount, nothing to record");
            return ReconciliationOutcome::Skipped {
                fund_name: fund.name.clone(),
                matched_fund_name: entity.name.clone(),
                amount: fund.amount.clone(),
                reason: ZERO_AMOUNT_REASON.to_string(),
            };
        }

        let record = NewLedgerRecord {
            title: title.to_string(),
            entity_id: entity.id.clone(),
            amount,
            movement: MovementKind::Return,
            date,
        };

        match self.store.create_record(&record).await {
            Ok(record_id) => {
                info!(fund = %fund.name, matched = %entity.name, record_id = %record_id, "Recorded return");
                ReconciliationOutcome::Success {
                    fund_name: fund.name.clone(),
                    matched_fund_name: entity.name.clone(),
                    record_id,
                    amount: fund.amount.clone(),
                }
            }
            Err(e) => {
                warn!(fund = %fund.name, error = %e, "Ledger write failed");
                ReconciliationOutcome::Error {
                    fund_name: fund.name.clone(),
                    amount: fund.amount.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}
