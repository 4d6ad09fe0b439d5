//! `fundsync-ledger`: the Notion workspace the reconciled returns land in.

pub mod directory;
pub mod notion;

pub use directory::{entity_from_page, EntityDirectory, UNKNOWN_FUND_NAME};
pub use notion::NotionLedger;
