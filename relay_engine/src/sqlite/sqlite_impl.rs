//! `SqliteLedger` is a concrete implementation of the relay's durable ledger.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`RelayLedger`] trait. Each operation acquires a
//! connection from the pool and is independently transactional; no multi-statement transaction ever spans a network
//! call in the relay.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::{info, warn};
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite, SqlitePool};

use super::db::{claims, deliveries, new_pool, states};
use crate::{
    db_types::{OrderState, StatusKey},
    traits::{ClaimResult, InsertDeliveryResult, LedgerError, RelayLedger},
};

#[derive(Clone)]
pub struct SqliteLedger {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteLedger ({:?})", self.pool)
    }
}

impl SqliteLedger {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = new_pool(url, max_connections).await.map_err(|e| LedgerError::ConnectionError(e.to_string()))?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database file if it does not exist yet. Call this before [`SqliteLedger::new_with_url`] on first
    /// run.
    pub async fn create_database_if_missing(url: &str) -> Result<(), LedgerError> {
        match Sqlite::database_exists(url).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                Sqlite::create_database(url).await.map_err(|e| LedgerError::ConnectionError(e.to_string()))?;
                info!("🗃️ Created SQLite ledger database at {url}");
                Ok(())
            },
            Err(e) => {
                warn!("🗃️ Could not determine whether the ledger database exists. {e}");
                Err(LedgerError::ConnectionError(e.to_string()))
            },
        }
    }

    /// Brings the ledger schema up to date.
    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::MigrationError(e.to_string()))?;
        info!("🗃️ Ledger migrations complete");
        Ok(())
    }
}

impl RelayLedger for SqliteLedger {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn record_delivery(
        &self,
        topic: &str,
        resource: &str,
        sent: &str,
    ) -> Result<InsertDeliveryResult, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        deliveries::insert_delivery(topic, resource, sent, &mut conn).await
    }

    async fn claim_order(&self, order_id: &str) -> Result<ClaimResult, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        claims::insert_claim(order_id, &mut conn).await
    }

    async fn release_claim(&self, order_id: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        claims::delete_claim(order_id, &mut conn).await
    }

    async fn fetch_state(&self, order_id: &str) -> Result<Option<OrderState>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        states::fetch_state(order_id, &mut conn).await
    }

    async fn upsert_state(&self, order_id: &str, status: StatusKey) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        states::upsert_state(order_id, status, &mut conn).await
    }

    async fn purge_deliveries_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        deliveries::purge_before(cutoff, &mut conn).await
    }
}
