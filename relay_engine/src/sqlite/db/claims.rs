use log::trace;
use sqlx::SqliteConnection;

use crate::traits::{ClaimResult, LedgerError};

/// Tries to claim an order id in a single atomic insert. The primary key on `order_id` guarantees that exactly one
/// of any number of concurrent claim attempts for the same order succeeds.
pub async fn insert_claim(order_id: &str, conn: &mut SqliteConnection) -> Result<ClaimResult, LedgerError> {
    let result = sqlx::query("INSERT INTO order_claims (order_id) VALUES ($1)").bind(order_id).execute(conn).await;
    match result {
        Ok(_) => {
            trace!("🗃️ Claimed order {order_id}");
            Ok(ClaimResult::Claimed)
        },
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => Ok(ClaimResult::AlreadyClaimed),
        Err(e) => Err(e.into()),
    }
}

/// Deletes the claim for an order id. Idempotent; deleting a claim that does not exist is a no-op.
pub async fn delete_claim(order_id: &str, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    let result = sqlx::query("DELETE FROM order_claims WHERE order_id = $1").bind(order_id).execute(conn).await?;
    trace!("🗃️ Released claim on order {order_id} ({} rows)", result.rows_affected());
    Ok(())
}
