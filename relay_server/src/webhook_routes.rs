//----------------------------------------------   Webhook pipeline  ---------------------------------------------------
//
// The notification handler below is the relay's core: verify → dedupe → claim → resolve → decide → forward → record
// → release. Webhook responses are always in the 200 range for decided outcomes, otherwise the marketplace would
// retry notifications that can never become valid. The one exception is a ledger failure, which fails closed with a
// server error because uniqueness could not be established.

use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use meli_tools::{helpers::extract_order_id, MeliApiError, OrderSource};
use relay_engine::{ClaimResult, InsertDeliveryResult, LedgerApi, RelayLedger};

use crate::{
    config::PipelineOptions,
    data_objects::{Notification, SaleEvent, WebhookAck},
    decision::{derive_status_key, is_late_duplicate, semantic_block_reason},
    errors::ServerError,
    forwarder::EventSink,
    helpers::verify_webhook_signature,
    route,
};

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

route!(webhook_notification => Post "/webhook" impl RelayLedger, OrderSource, EventSink);
pub async fn webhook_notification<L, S, F>(
    req: HttpRequest,
    body: web::Bytes,
    ledger: web::Data<LedgerApi<L>>,
    orders: web::Data<S>,
    sink: web::Data<F>,
    options: web::Data<PipelineOptions>,
) -> Result<HttpResponse, ServerError>
where
    L: RelayLedger,
    S: OrderSource,
    F: EventSink,
{
    trace!("📨 Received notification ({} bytes)", body.len());
    if let Some(secret) = options.webhook_secret.as_ref() {
        let header = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if !verify_webhook_signature(secret.reveal(), &body, header) {
            warn!("📨 Rejected notification with a missing or invalid signature");
            return Err(ServerError::InvalidSignature);
        }
    }
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!("📨 Notification body is not JSON. {e}");
            return Ok(HttpResponse::Ok().json(WebhookAck::ignored("bad_json")));
        },
    };
    let notification: Notification = match serde_json::from_value(value) {
        Ok(n) => n,
        Err(e) => {
            debug!("📨 Notification body has the wrong shape. {e}");
            return Ok(HttpResponse::Ok().json(WebhookAck::ignored("bad_payload")));
        },
    };
    if !options.topic_allowed(&notification.topic) {
        debug!("📨 Ignoring notification for disallowed topic {}", notification.topic);
        return Ok(HttpResponse::Ok().json(WebhookAck::ignored("topic_not_allowed")));
    }
    let Some(order_id) = extract_order_id(&notification.resource) else {
        debug!("📨 No order id in resource {}", notification.resource);
        return Ok(HttpResponse::Ok().json(WebhookAck::ignored("no_order_id")));
    };
    // A ledger error from here on aborts the request (fail closed): `?` maps it to a 500 response.
    let recorded =
        ledger.record_delivery(&notification.topic, &notification.resource, notification.sent_token()).await?;
    if recorded == InsertDeliveryResult::AlreadyExists {
        debug!("📨 Duplicate delivery for {}", notification.resource);
        return Ok(HttpResponse::Ok().json(WebhookAck::ignored("duplicate")));
    }
    if ledger.claim_order(&order_id).await? == ClaimResult::AlreadyClaimed {
        debug!("📨 Order {order_id} is already being processed");
        return Ok(HttpResponse::Ok().json(WebhookAck::ignored_order("already_processing", &order_id)));
    }
    // The claim is held from here on and must be released on every exit path, so all processing happens in
    // `process_claimed` and the release runs unconditionally before the outcome is interpreted.
    let outcome =
        process_claimed(&notification, &order_id, ledger.get_ref(), orders.get_ref(), sink.get_ref(), &options).await;
    if let Err(e) = ledger.release_claim(&order_id).await {
        error!("📨 Could not release the claim on order {order_id}. {e}");
    }
    outcome.map(|ack| HttpResponse::Ok().json(ack))
}

/// Resolve, decide and (maybe) forward a claimed order. Ledger errors propagate; everything else is expressed as an
/// acknowledgement so the caller can still release the claim and answer 200.
async fn process_claimed<L, S, F>(
    notification: &Notification,
    order_id: &str,
    ledger: &LedgerApi<L>,
    orders: &S,
    sink: &F,
    options: &PipelineOptions,
) -> Result<WebhookAck, ServerError>
where
    L: RelayLedger,
    S: OrderSource,
    F: EventSink,
{
    let order = match orders.fetch_order(order_id).await {
        Ok(order) => order,
        Err(MeliApiError::OrderFetch { status, message }) => {
            warn!("📨 Order fetch for {order_id} failed with upstream status {status}. {message}");
            return Ok(WebhookAck::fetch_error(order_id, Some(status)));
        },
        Err(e) => {
            // Credential refresh and transport problems land here. The claim release by our caller lets a later
            // redelivery retry the fetch.
            error!("📨 Could not resolve order {order_id}. {e}");
            return Ok(WebhookAck::fetch_error(order_id, None));
        },
    };
    let Some(status_key) = derive_status_key(&order) else {
        debug!("📨 Order {order_id} status '{}' is not a trigger state", order.status);
        return Ok(WebhookAck::ignored_order("no_state_transition", order_id));
    };
    let stored = ledger.fetch_state(order_id).await?;
    let is_new_transition = stored.as_ref().map(|s| s.forwarded_status) != Some(status_key);
    if options.semantic_blocks {
        if let Some(reason) = semantic_block_reason(&order) {
            if options.forward_through_blocks && is_new_transition {
                info!("📨 Forwarding order {order_id} through its '{reason}' block: new transition to {status_key}");
            } else {
                info!("📨 Order {order_id} blocked from forwarding: {reason}");
                return Ok(WebhookAck::ignored_order(reason.to_string(), order_id));
            }
        }
    }
    if !is_new_transition {
        debug!("📨 Order {order_id} already forwarded as {status_key}");
        return Ok(WebhookAck::ignored_order("no_state_transition", order_id));
    }
    if let (Some(window), Some(state)) = (options.late_duplicate_window, stored.as_ref()) {
        if is_late_duplicate(notification.sent_at(), state.first_forwarded_at, window) {
            info!("📨 Suppressing late duplicate for order {order_id} (sent {:?})", notification.sent);
            return Ok(WebhookAck::ignored_order("late_duplicate", order_id));
        }
    }
    let event = SaleEvent::new(notification, order_id, status_key, &order);
    let key = event.idempotency_key();
    let result = sink.deliver(&event, &key).await;
    if result.delivered() {
        // Recording the state only after a confirmed delivery means a crash or forward failure here leaves the
        // state unset, and a later redelivery of the same state gets another chance.
        ledger.upsert_state(order_id, status_key).await?;
        info!("✅ Order {order_id} forwarded as {status_key}");
        Ok(WebhookAck::forwarded(status_key, order_id, result.status))
    } else {
        let detail = result.error.unwrap_or_else(|| format!("sink answered {:?}", result.status));
        error!("📤 Could not forward sale event for order {order_id}. {detail}");
        Ok(WebhookAck::forward_failed(order_id))
    }
}
