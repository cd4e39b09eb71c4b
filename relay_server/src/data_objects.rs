use chrono::{DateTime, Utc};
use meli_tools::OrderSnapshot;
use relay_engine::db_types::StatusKey;
use serde::{Deserialize, Serialize};

/// An inbound "order changed" notification from the marketplace. Only `topic` and `resource` are required; the rest
/// of the marketplace's bookkeeping fields are accepted and carried through where useful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub resource: String,
    #[serde(default)]
    pub sent: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub application_id: Option<i64>,
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub received: Option<String>,
}

impl Notification {
    /// The `sent` value as recorded in the delivery fingerprint. Absent timestamps fingerprint as the empty string.
    pub fn sent_token(&self) -> &str {
        self.sent.as_deref().unwrap_or("")
    }

    /// The `sent` timestamp, when present and parseable.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent.as_deref().and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|t| t.with_timezone(&Utc))
    }
}

/// The acknowledgement body returned to the marketplace. Webhook responses are always HTTP 200 with `ok: true` for
/// decided outcomes; what happened is described by the remaining fields so the notifier is never encouraged to
/// retry something that can never become valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded: Option<StatusKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sink_status: Option<u16>,
}

impl WebhookAck {
    fn blank() -> Self {
        Self { ok: true, ignored: None, forwarded: None, order_id: None, upstream_status: None, sink_status: None }
    }

    pub fn ignored<S: Into<String>>(reason: S) -> Self {
        Self { ignored: Some(reason.into()), ..Self::blank() }
    }

    pub fn ignored_order<S: Into<String>>(reason: S, order_id: &str) -> Self {
        Self { ignored: Some(reason.into()), order_id: Some(order_id.to_string()), ..Self::blank() }
    }

    pub fn fetch_error(order_id: &str, upstream_status: Option<u16>) -> Self {
        Self {
            ignored: Some("fetch_error".to_string()),
            order_id: Some(order_id.to_string()),
            upstream_status,
            ..Self::blank()
        }
    }

    pub fn forwarded(status: StatusKey, order_id: &str, sink_status: Option<u16>) -> Self {
        Self { forwarded: Some(status), order_id: Some(order_id.to_string()), sink_status, ..Self::blank() }
    }

    pub fn forward_failed(order_id: &str) -> Self {
        Self::ignored_order("forward_failed", order_id)
    }
}

/// The normalized event delivered to the sink: the notification identity plus the decision-relevant slice of the
/// order snapshot, flattened so the downstream automation never needs to call the marketplace itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleEvent {
    pub topic: String,
    pub resource: String,
    pub order_id: String,
    pub status_key: StatusKey,
    pub sent: Option<String>,
    pub sent_unix: i64,
    pub order_status: String,
    pub seller_id: Option<u64>,
    pub buyer_id: Option<u64>,
    pub total_amount: Option<f64>,
    pub paid_amount: Option<f64>,
    pub tags: Vec<String>,
    pub internal_tags: Vec<String>,
    pub fulfilled: bool,
}

impl SaleEvent {
    pub fn new(notification: &Notification, order_id: &str, status_key: StatusKey, order: &OrderSnapshot) -> Self {
        Self {
            topic: notification.topic.clone(),
            resource: notification.resource.clone(),
            order_id: order_id.to_string(),
            status_key,
            sent: notification.sent.clone(),
            sent_unix: Utc::now().timestamp(),
            order_status: order.status.clone(),
            seller_id: order.seller.as_ref().and_then(|p| p.id),
            buyer_id: order.buyer.as_ref().and_then(|p| p.id),
            total_amount: order.total_amount,
            paid_amount: order.paid_amount,
            tags: order.tags_lower(),
            internal_tags: order.internal_tags_lower(),
            fulfilled: order.is_fulfilled(),
        }
    }

    /// The deterministic idempotency key the sink can use to deduplicate redeliveries on its side.
    pub fn idempotency_key(&self) -> String {
        format!("order:{}:{}", self.order_id, self.status_key)
    }
}
