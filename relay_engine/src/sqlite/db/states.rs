use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderState, StatusKey},
    traits::LedgerError,
};

/// Returns the last forwarded state for the given order id, if the order was ever forwarded.
pub async fn fetch_state(order_id: &str, conn: &mut SqliteConnection) -> Result<Option<OrderState>, LedgerError> {
    let state = sqlx::query_as("SELECT * FROM order_states WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(state)
}

/// Creates or updates the forwarded-state row for an order. On conflict only `forwarded_status` and `updated_at`
/// change; `first_forwarded_at` keeps the timestamp of the very first forward.
pub async fn upsert_state(
    order_id: &str,
    status: StatusKey,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
            INSERT INTO order_states (order_id, forwarded_status) VALUES ($1, $2)
            ON CONFLICT (order_id) DO UPDATE
            SET forwarded_status = excluded.forwarded_status, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(order_id)
    .bind(status)
    .execute(conn)
    .await?;
    debug!("🗃️ Order {order_id} marked as forwarded with status {status}");
    Ok(())
}
