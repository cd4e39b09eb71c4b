use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::traits::{InsertDeliveryResult, LedgerError};

/// Records a delivery fingerprint in a single atomic insert. The unique constraint on
/// `(topic, resource, sent)` doubles as the dedup check: a constraint violation maps to `AlreadyExists`, every other
/// database failure is a real error.
pub async fn insert_delivery(
    topic: &str,
    resource: &str,
    sent: &str,
    conn: &mut SqliteConnection,
) -> Result<InsertDeliveryResult, LedgerError> {
    let result = sqlx::query("INSERT INTO deliveries (topic, resource, sent) VALUES ($1, $2, $3)")
        .bind(topic)
        .bind(resource)
        .bind(sent)
        .execute(conn)
        .await;
    match result {
        Ok(_) => {
            trace!("🗃️ Recorded delivery fingerprint ({topic}, {resource}, {sent})");
            Ok(InsertDeliveryResult::Inserted)
        },
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => Ok(InsertDeliveryResult::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

/// Deletes fingerprints seen before the cutoff. Purged triples can be recorded again, which is acceptable: the
/// retention window is chosen to be far longer than the marketplace's redelivery horizon.
pub async fn purge_before(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, LedgerError> {
    let result = sqlx::query("DELETE FROM deliveries WHERE seen_at < $1").bind(cutoff).execute(conn).await?;
    Ok(result.rows_affected())
}
