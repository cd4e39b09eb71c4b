use chrono::{DateTime, Utc};
use log::{debug, trace};

use crate::{
    db_types::{OrderState, StatusKey},
    traits::{ClaimResult, InsertDeliveryResult, LedgerError, RelayLedger},
};

/// The public API for the durable ledger. Handlers talk to this wrapper rather than to a backend directly, so that
/// endpoint tests can substitute a mock backend.
#[derive(Debug, Clone)]
pub struct LedgerApi<B> {
    db: B,
}

impl<B: RelayLedger> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn record_delivery(
        &self,
        topic: &str,
        resource: &str,
        sent: &str,
    ) -> Result<InsertDeliveryResult, LedgerError> {
        trace!("🖥️ Recording delivery ({topic}, {resource}, {sent})");
        self.db.record_delivery(topic, resource, sent).await
    }

    pub async fn claim_order(&self, order_id: &str) -> Result<ClaimResult, LedgerError> {
        trace!("🖥️ Claiming order {order_id}");
        self.db.claim_order(order_id).await
    }

    pub async fn release_claim(&self, order_id: &str) -> Result<(), LedgerError> {
        trace!("🖥️ Releasing claim on order {order_id}");
        self.db.release_claim(order_id).await
    }

    pub async fn fetch_state(&self, order_id: &str) -> Result<Option<OrderState>, LedgerError> {
        self.db.fetch_state(order_id).await
    }

    pub async fn upsert_state(&self, order_id: &str, status: StatusKey) -> Result<(), LedgerError> {
        debug!("🖥️ Recording forwarded status {status} for order {order_id}");
        self.db.upsert_state(order_id, status).await
    }

    pub async fn purge_deliveries_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LedgerError> {
        self.db.purge_deliveries_before(cutoff).await
    }
}
