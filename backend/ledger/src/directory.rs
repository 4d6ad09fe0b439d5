//! Snapshot of the funds known to the ledger.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use fundsync_core::{DirectoryError, EntityPage, LedgerEntity, LedgerStore};

/// Display name given to pages whose title property is missing or empty.
pub const UNKNOWN_FUND_NAME: &str = "未知基金";

/// Read-only view over the fund collection.
pub struct EntityDirectory {
    store: Arc<dyn LedgerStore>,
    name_property: String,
}

impl EntityDirectory {
    pub fn new(store: Arc<dyn LedgerStore>, name_property: impl Into<String>) -> Self {
        Self {
            store,
            name_property: name_property.into(),
        }
    }

    /// One logical query; every page becomes an entity, in store order.
    pub async fn list_entities(&self) -> Result<Vec<LedgerEntity>, DirectoryError> {
        let pages = self.store.query_entities().await?;
        let entities: Vec<LedgerEntity> = pages
            .iter()
            .map(|page| entity_from_page(page, &self.name_property))
            .collect();

        let unnamed = entities.iter().filter(|e| e.name == UNKNOWN_FUND_NAME).count();
        if unnamed > 0 {
            debug!(unnamed, property = %self.name_property, "Pages without a display name");
        }
        info!(count = entities.len(), "Loaded fund directory");
        Ok(entities)
    }
}

/// Map a page to `{id, name}` using the first fragment of a title property.
pub fn entity_from_page(page: &EntityPage, name_property: &str) -> LedgerEntity {
    let name = page
        .properties
        .get(name_property)
        .and_then(|p| p.get("title"))
        .and_then(Value::as_array)
        .and_then(|fragments| fragments.first())
        .and_then(|f| f.get("plain_text"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_FUND_NAME);
    LedgerEntity::new(page.id.clone(), name)
}
