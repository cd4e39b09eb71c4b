use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{OrderState, StatusKey};

/// The outcome of recording a delivery fingerprint. A duplicate is a normal, expected result and is deliberately not
/// an error: callers must be able to distinguish "we have seen this before" from "the store is broken".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertDeliveryResult {
    Inserted,
    AlreadyExists,
}

/// The outcome of an order claim attempt. `AlreadyClaimed` is expected under concurrent redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
    Claimed,
    AlreadyClaimed,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Could not connect to the ledger database. {0}")]
    ConnectionError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Could not run ledger migrations. {0}")]
    MigrationError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// This trait defines the behaviour of the durable ledger backing the relay.
///
/// The two insert operations are the only cross-request coordination points in the whole system. They must be atomic
/// at the storage layer (unique constraint + single insert), so that a race between two identical notifications
/// yields exactly one `Inserted` / `Claimed`, even when several relay processes share the backing store.
///
/// Any `Err` from these methods means "uniqueness could not be established" and callers must fail closed: do not
/// fetch, decide or forward on the strength of an ambiguous ledger result.
#[allow(async_fn_in_trait)]
pub trait RelayLedger {
    /// The URL of the backing database.
    fn url(&self) -> &str;

    /// Record a raw delivery fingerprint. Returns `AlreadyExists` iff the exact `(topic, resource, sent)` triple has
    /// been recorded before.
    async fn record_delivery(
        &self,
        topic: &str,
        resource: &str,
        sent: &str,
    ) -> Result<InsertDeliveryResult, LedgerError>;

    /// Try to claim exclusive processing rights for an order id. Returns `AlreadyClaimed` if another request holds
    /// the claim. Claims do not queue; the loser is expected to drop the notification.
    async fn claim_order(&self, order_id: &str) -> Result<ClaimResult, LedgerError>;

    /// Release the claim on an order id. Idempotent; releasing a claim that does not exist is not an error.
    async fn release_claim(&self, order_id: &str) -> Result<(), LedgerError>;

    /// Fetch the last forwarded state for an order id, if any was ever forwarded.
    async fn fetch_state(&self, order_id: &str) -> Result<Option<OrderState>, LedgerError>;

    /// Record a successful forward. Creates the state row on first forward; on a later transition, overwrites
    /// `forwarded_status` and preserves `first_forwarded_at`.
    async fn upsert_state(&self, order_id: &str, status: StatusKey) -> Result<(), LedgerError>;

    /// Delete delivery fingerprints seen before `cutoff`, returning the number of rows purged. Claims and order
    /// states are never touched by retention.
    async fn purge_deliveries_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LedgerError>;
}
