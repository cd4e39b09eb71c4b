use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------     StatusKey       ---------------------------------------------------------

/// The normalized trigger state derived from an order snapshot. This is the value the state-transition gate compares
/// against the last forwarded status: an order is forwarded at most once per status key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StatusKey {
    Paid,
    ConfirmedApproved,
}

impl Display for StatusKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paid => write!(f, "paid"),
            Self::ConfirmedApproved => write!(f, "confirmed_approved"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status key: {0}")]
pub struct StatusKeyParseError(String);

impl FromStr for StatusKey {
    type Err = StatusKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            "confirmed_approved" => Ok(Self::ConfirmedApproved),
            other => Err(StatusKeyParseError(other.to_string())),
        }
    }
}

//--------------------------------------   DeliveryRecord    ---------------------------------------------------------

/// One raw notification instance. The `(topic, resource, sent)` triple is unique; re-inserting the same triple is the
/// dedup signal. Records are never updated. They are only removed by the retention sweep.
#[derive(Debug, Clone, FromRow)]
pub struct DeliveryRecord {
    pub id: i64,
    pub topic: String,
    pub resource: String,
    pub sent: String,
    pub seen_at: DateTime<Utc>,
}

//--------------------------------------     OrderClaim      ---------------------------------------------------------

/// A short-lived exclusivity marker: while a claim row exists, some request is resolving that order. At most one live
/// claim per order id, enforced by the primary key.
#[derive(Debug, Clone, FromRow)]
pub struct OrderClaim {
    pub order_id: String,
    pub claimed_at: DateTime<Utc>,
}

//--------------------------------------     OrderState      ---------------------------------------------------------

/// The last status key that was successfully forwarded for an order. `first_forwarded_at` is set on the first write
/// and preserved across later upserts; only `forwarded_status` and `updated_at` change on a new transition.
#[derive(Debug, Clone, FromRow)]
pub struct OrderState {
    pub order_id: String,
    pub forwarded_status: StatusKey,
    pub first_forwarded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
