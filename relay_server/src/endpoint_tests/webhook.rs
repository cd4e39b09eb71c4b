use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use meli_tools::{MeliApiError, OrderPayment, OrderSnapshot};
use relay_engine::{
    db_types::{OrderState, StatusKey},
    ClaimResult,
    InsertDeliveryResult,
    LedgerApi,
    LedgerError,
};

use super::{
    helpers::post_notification,
    mocks::{MockLedger, MockOrders, MockSink},
};
use crate::{
    config::PipelineOptions,
    forwarder::DeliveryResult,
    helpers::calculate_hmac,
    webhook_routes::WebhookNotificationRoute,
};

const NOTIFICATION: &str = r#"{"topic":"orders_v2","resource":"/orders/2000001","sent":"2024-06-10T12:00:00Z","user_id":1,"attempts":1}"#;

fn options() -> PipelineOptions {
    PipelineOptions {
        allowed_topics: vec!["orders_v2".to_string()],
        webhook_secret: None,
        semantic_blocks: true,
        forward_through_blocks: false,
        late_duplicate_window: None,
    }
}

// Mocks panic on any call without a matching expectation, so tests that register bare mocks are also asserting
// that the pipeline never touched the ledger, the marketplace or the sink.
fn register(cfg: &mut ServiceConfig, ledger: MockLedger, orders: MockOrders, sink: MockSink, options: PipelineOptions) {
    cfg.service(WebhookNotificationRoute::<MockLedger, MockOrders, MockSink>::new())
        .app_data(web::Data::new(LedgerApi::new(ledger)))
        .app_data(web::Data::new(orders))
        .app_data(web::Data::new(sink))
        .app_data(web::Data::new(options));
}

fn paid_order() -> OrderSnapshot {
    OrderSnapshot {
        id: Some(2000001),
        status: "paid".to_string(),
        payments: vec![OrderPayment { status: "approved".to_string() }],
        total_amount: Some(1500.0),
        paid_amount: Some(1500.0),
        ..OrderSnapshot::default()
    }
}

fn stored_state(status: StatusKey) -> OrderState {
    let t = Utc.with_ymd_and_hms(2024, 6, 10, 11, 0, 0).unwrap();
    OrderState { order_id: "2000001".to_string(), forwarded_status: status, first_forwarded_at: t, updated_at: t }
}

//------------------------------------------   Pre-ledger rejections  -------------------------------------------------

#[actix_web::test]
async fn non_json_bodies_are_acknowledged_and_dropped() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_notification("not even json", None, |cfg| {
        register(cfg, MockLedger::new(), MockOrders::new(), MockSink::new(), options());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"bad_json""#), "{body}");
}

#[actix_web::test]
async fn wrongly_shaped_bodies_are_acknowledged_and_dropped() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_notification(r#"{"foo": 1}"#, None, |cfg| {
        register(cfg, MockLedger::new(), MockOrders::new(), MockSink::new(), options());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"bad_payload""#), "{body}");
}

#[actix_web::test]
async fn disallowed_topics_are_ignored() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"topic":"items","resource":"/orders/2000001"}"#;
    let (status, body) = post_notification(payload, None, |cfg| {
        register(cfg, MockLedger::new(), MockOrders::new(), MockSink::new(), options());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"topic_not_allowed""#), "{body}");
}

#[actix_web::test]
async fn resources_without_an_order_id_are_ignored() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"topic":"orders_v2","resource":"/shipments/44444"}"#;
    let (status, body) = post_notification(payload, None, |cfg| {
        register(cfg, MockLedger::new(), MockOrders::new(), MockSink::new(), options());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"no_order_id""#), "{body}");
}

//------------------------------------------   Dedup and claims  ------------------------------------------------------

#[actix_web::test]
async fn duplicate_deliveries_are_dropped_before_claiming() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger
            .expect_record_delivery()
            .withf(|topic, resource, sent| {
                topic == "orders_v2" && resource == "/orders/2000001" && sent == "2024-06-10T12:00:00Z"
            })
            .returning(|_, _, _| Ok(InsertDeliveryResult::AlreadyExists));
        register(cfg, ledger, MockOrders::new(), MockSink::new(), options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"duplicate""#), "{body}");
}

#[actix_web::test]
async fn contended_orders_are_dropped_without_releasing_the_winners_claim() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::AlreadyClaimed));
        // No release_claim expectation: releasing here would delete the claim held by the concurrent winner.
        register(cfg, ledger, MockOrders::new(), MockSink::new(), options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"already_processing""#), "{body}");
}

#[actix_web::test]
async fn ledger_failures_fail_closed() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger
            .expect_record_delivery()
            .returning(|_, _, _| Err(LedgerError::DatabaseError("disk I/O error".to_string())));
        register(cfg, ledger, MockOrders::new(), MockSink::new(), options());
    }
    let err = post_notification(NOTIFICATION, None, configure).await.expect_err("Expected error");
    assert!(err.contains("disk I/O error"), "{err}");
}

//------------------------------------------   Decision and forward  --------------------------------------------------

#[actix_web::test]
async fn first_paid_notification_is_forwarded() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().withf(|id| id == "2000001").returning(|_| Ok(ClaimResult::Claimed));
        ledger.expect_fetch_state().returning(|_| Ok(None));
        ledger
            .expect_upsert_state()
            .withf(|id, status| id == "2000001" && *status == StatusKey::Paid)
            .times(1)
            .returning(|_, _| Ok(()));
        ledger.expect_release_claim().withf(|id| id == "2000001").times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().withf(|id| id == "2000001").returning(|_| Ok(paid_order()));
        let mut sink = MockSink::new();
        sink.expect_deliver()
            .withf(|event, key| key == "order:2000001:paid" && event.status_key == StatusKey::Paid)
            .times(1)
            .returning(|_, _| DeliveryResult { status: Some(200), body: Some("{}".to_string()), error: None });
        register(cfg, ledger, orders, sink, options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""forwarded":"paid""#), "{body}");
    assert!(body.contains(r#""sink_status":200"#), "{body}");
}

#[actix_web::test]
async fn repeated_states_are_not_reforwarded() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::Claimed));
        ledger.expect_fetch_state().returning(|_| Ok(Some(stored_state(StatusKey::Paid))));
        ledger.expect_release_claim().times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().returning(|_| Ok(paid_order()));
        register(cfg, ledger, orders, MockSink::new(), options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"no_state_transition""#), "{body}");
}

#[actix_web::test]
async fn confirmed_orders_without_an_approved_payment_are_not_sales() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::Claimed));
        ledger.expect_release_claim().times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().returning(|_| {
            Ok(OrderSnapshot {
                status: "confirmed".to_string(),
                payments: vec![OrderPayment { status: "pending".to_string() }],
                ..OrderSnapshot::default()
            })
        });
        register(cfg, ledger, orders, MockSink::new(), options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"no_state_transition""#), "{body}");
}

#[actix_web::test]
async fn confirmed_orders_with_an_approved_payment_forward() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::Claimed));
        ledger.expect_fetch_state().returning(|_| Ok(None));
        ledger
            .expect_upsert_state()
            .withf(|_, status| *status == StatusKey::ConfirmedApproved)
            .times(1)
            .returning(|_, _| Ok(()));
        ledger.expect_release_claim().times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().returning(|_| {
            Ok(OrderSnapshot {
                status: "confirmed".to_string(),
                payments: vec![
                    OrderPayment { status: "rejected".to_string() },
                    OrderPayment { status: "approved".to_string() },
                ],
                ..OrderSnapshot::default()
            })
        });
        let mut sink = MockSink::new();
        sink.expect_deliver()
            .withf(|_, key| key == "order:2000001:confirmed_approved")
            .times(1)
            .returning(|_, _| DeliveryResult { status: Some(200), body: None, error: None });
        register(cfg, ledger, orders, sink, options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""forwarded":"confirmed_approved""#), "{body}");
}

#[actix_web::test]
async fn delivered_orders_are_blocked_from_forwarding() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::Claimed));
        ledger.expect_fetch_state().returning(|_| Ok(None));
        ledger.expect_release_claim().times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().returning(|_| {
            Ok(OrderSnapshot { tags: vec!["Delivered".to_string()], ..paid_order() })
        });
        register(cfg, ledger, orders, MockSink::new(), options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"delivered""#), "{body}");
}

#[actix_web::test]
async fn blocked_orders_forward_on_a_new_transition_when_configured() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::Claimed));
        ledger.expect_fetch_state().returning(|_| Ok(None));
        ledger.expect_upsert_state().times(1).returning(|_, _| Ok(()));
        ledger.expect_release_claim().times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().returning(|_| Ok(OrderSnapshot { fulfilled: Some(true), ..paid_order() }));
        let mut sink = MockSink::new();
        sink.expect_deliver()
            .times(1)
            .returning(|_, _| DeliveryResult { status: Some(200), body: None, error: None });
        let options = PipelineOptions { forward_through_blocks: true, ..options() };
        register(cfg, ledger, orders, sink, options);
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""forwarded":"paid""#), "{body}");
}

#[actix_web::test]
async fn stale_redeliveries_are_suppressed_inside_the_window() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::Claimed));
        // The stored state is a different status key, so this would otherwise be a forwardable transition.
        ledger.expect_fetch_state().returning(|_| {
            let t = Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap();
            Ok(Some(OrderState {
                order_id: "2000001".to_string(),
                forwarded_status: StatusKey::ConfirmedApproved,
                first_forwarded_at: t,
                updated_at: t,
            }))
        });
        ledger.expect_release_claim().times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().returning(|_| Ok(paid_order()));
        let options =
            PipelineOptions { late_duplicate_window: Some(chrono::Duration::hours(1)), ..options() };
        register(cfg, ledger, orders, MockSink::new(), options);
    }
    // `sent` in the canned notification is two days before the stored first forward.
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"late_duplicate""#), "{body}");
}

//------------------------------------------   Failure handling  ------------------------------------------------------

#[actix_web::test]
async fn fetch_failures_release_the_claim() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::Claimed));
        ledger.expect_release_claim().withf(|id| id == "2000001").times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().returning(|_| {
            Err(MeliApiError::OrderFetch { status: 404, message: "order not found".to_string() })
        });
        register(cfg, ledger, orders, MockSink::new(), options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"fetch_error""#), "{body}");
    assert!(body.contains(r#""upstream_status":404"#), "{body}");
}

#[actix_web::test]
async fn failed_forwards_do_not_record_state() {
    let _ = env_logger::try_init().ok();
    fn configure(cfg: &mut ServiceConfig) {
        let mut ledger = MockLedger::new();
        ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::Inserted));
        ledger.expect_claim_order().returning(|_| Ok(ClaimResult::Claimed));
        ledger.expect_fetch_state().returning(|_| Ok(None));
        // No upsert_state expectation: a failed forward means the next redelivery must get a fresh chance.
        ledger.expect_release_claim().times(1).returning(|_| Ok(()));
        let mut orders = MockOrders::new();
        orders.expect_fetch_order().returning(|_| Ok(paid_order()));
        let mut sink = MockSink::new();
        sink.expect_deliver()
            .times(1)
            .returning(|_, _| DeliveryResult::failed("connection refused".to_string()));
        register(cfg, ledger, orders, sink, options());
    }
    let (status, body) = post_notification(NOTIFICATION, None, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"forward_failed""#), "{body}");
}

//------------------------------------------   Signature checks  ------------------------------------------------------

fn configure_with_secret(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_record_delivery().returning(|_, _, _| Ok(InsertDeliveryResult::AlreadyExists));
    let options = PipelineOptions { webhook_secret: Some(msr_common::Secret::new("s3cret".to_string())), ..options() };
    register(cfg, ledger, MockOrders::new(), MockSink::new(), options);
}

#[actix_web::test]
async fn unsigned_notifications_are_rejected_when_a_secret_is_set() {
    let _ = env_logger::try_init().ok();
    let err = post_notification(NOTIFICATION, None, configure_with_secret).await.expect_err("Expected error");
    assert_eq!(err, "Webhook signature invalid or not provided");
}

#[actix_web::test]
async fn badly_signed_notifications_are_rejected() {
    let _ = env_logger::try_init().ok();
    let sig = format!("sha256={}", "00".repeat(32));
    let err =
        post_notification(NOTIFICATION, Some(&sig), configure_with_secret).await.expect_err("Expected error");
    assert_eq!(err, "Webhook signature invalid or not provided");
}

#[actix_web::test]
async fn correctly_signed_notifications_are_processed() {
    let _ = env_logger::try_init().ok();
    let sig = format!("sha256={}", calculate_hmac("s3cret", NOTIFICATION.as_bytes()));
    let (status, body) =
        post_notification(NOTIFICATION, Some(&sig), configure_with_secret).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ignored":"duplicate""#), "{body}");
}
