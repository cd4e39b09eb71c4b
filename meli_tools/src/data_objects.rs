use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// The marketplace's current view of an order, fetched with payments embedded. The relay never mutates this; it is
/// fetched fresh for every claimed notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSnapshot {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub status: String,
    /// Tri-state on the wire: true, false, or absent. Only `true` blocks forwarding.
    #[serde(default)]
    pub fulfilled: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub internal_tags: Vec<String>,
    #[serde(default)]
    pub payments: Vec<OrderPayment>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub seller: Option<Party>,
    #[serde(default)]
    pub buyer: Option<Party>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

impl OrderSnapshot {
    pub fn tags_lower(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.to_lowercase()).collect()
    }

    pub fn internal_tags_lower(&self) -> Vec<String> {
        self.internal_tags.iter().map(|t| t.to_lowercase()).collect()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled == Some(true)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPayment {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderSearchResults {
    #[serde(default)]
    pub results: Vec<OrderSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: u64,
}

/// One row of the unauthenticated sales listing proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleSummary {
    pub order_id: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub buyer: Option<String>,
    pub total_amount: Option<f64>,
    pub status: String,
}

impl From<OrderSnapshot> for SaleSummary {
    fn from(order: OrderSnapshot) -> Self {
        Self {
            order_id: order.id,
            created_at: order.date_created,
            buyer: order.buyer.and_then(|b| b.nickname),
            total_amount: order.total_amount,
            status: order.status,
        }
    }
}
