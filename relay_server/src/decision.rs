//! The pure decision rules of the relay. No I/O happens here: these functions map an order snapshot (and the stored
//! forwarding state) to a verdict, and the pipeline in [`crate::webhook_routes`] acts on it.

use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use meli_tools::OrderSnapshot;
use relay_engine::db_types::StatusKey;

/// Derives the normalized trigger state from an order snapshot:
/// * `status == "paid"` is a paid sale.
/// * `status == "confirmed"` with at least one approved payment is a confirmed-and-approved sale.
/// * Anything else is not a sale the relay acts on.
pub fn derive_status_key(order: &OrderSnapshot) -> Option<StatusKey> {
    match order.status.to_lowercase().as_str() {
        "paid" => Some(StatusKey::Paid),
        "confirmed" if order.payments.iter().any(|p| p.status.eq_ignore_ascii_case("approved")) => {
            Some(StatusKey::ConfirmedApproved)
        },
        _ => None,
    }
}

/// A business-rule veto that suppresses forwarding independent of payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Fulfilled,
    Delivered,
    InvoiceAuthorized,
}

impl Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fulfilled => write!(f, "fulfilled"),
            Self::Delivered => write!(f, "delivered"),
            Self::InvoiceAuthorized => write!(f, "invoice_authorized"),
        }
    }
}

/// Returns the first semantic block that applies to the order. Checks run in a fixed order: fulfilled flag, then the
/// `delivered` tag, then the `invoice_authorized` internal tag (tags case-insensitive).
pub fn semantic_block_reason(order: &OrderSnapshot) -> Option<BlockReason> {
    if order.is_fulfilled() {
        return Some(BlockReason::Fulfilled);
    }
    if order.tags.iter().any(|t| t.eq_ignore_ascii_case("delivered")) {
        return Some(BlockReason::Delivered);
    }
    if order.internal_tags.iter().any(|t| t.eq_ignore_ascii_case("invoice_authorized")) {
        return Some(BlockReason::InvoiceAuthorized);
    }
    None
}

/// The late-duplicate suppressor: a notification whose `sent` timestamp predates the order's first forward by more
/// than `window` is stale and should not forward, even for a new status key. Unparseable or absent timestamps never
/// count as late.
pub fn is_late_duplicate(
    sent_at: Option<DateTime<Utc>>,
    first_forwarded_at: DateTime<Utc>,
    window: Duration,
) -> bool {
    match sent_at {
        Some(sent) => sent < first_forwarded_at - window,
        None => false,
    }
}
