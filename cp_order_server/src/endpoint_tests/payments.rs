use actix_web::http::StatusCode;
use cp_order_engine::{
    db_types::{OrderStatusType, PaymentIntentStatus, PaymentStatus, Role},
    traits::{PaymentCaptured, StatusChange},
};
use serde_json::{json, Value};

use super::helpers::{
    checkout_provider,
    live_intent,
    post_request,
    sample_order,
    stored_intent,
    stored_notification,
    token_for,
    tracking_entry,
    Backends,
    CHECKOUT_KEY_ID,
};
use crate::routes::{InitiatePaymentRoute, VerifyPaymentRoute};

const ORDER_ID: &str = "CP-20241019-7QX2MD";
const PROVIDER_ORDER_ID: &str = "order_Lx3kQ9ZtW2mP0a";

type Mock = super::mocks::MockBackend;

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).expect("Response is not JSON")
}

fn owned_by(owner: &'static str) -> Backends {
    let mut backends = Backends::default();
    backends
        .orders
        .expect_fetch_order()
        .returning(move |id| Ok(Some(sample_order(id.as_str(), owner, OrderStatusType::Pending))));
    backends
        .payments
        .expect_fetch_order()
        .returning(move |id| Ok(Some(sample_order(id.as_str(), owner, OrderStatusType::Pending))));
    backends
}

#[actix_web::test]
async fn initiate_payment() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = owned_by("alice");
    backends
        .payments
        .expect_insert_payment_intent()
        .times(1)
        .returning(|new| Ok((stored_intent(11, new), vec![])));
    let path = format!("/orders/{ORDER_ID}/payment/initiate");
    let (status, body) = post_request(&token, &path, json!({"amount": 50_000}), |cfg| {
        backends.register(cfg);
        cfg.service(InitiatePaymentRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let init = json_body(&body);
    assert_eq!(init["intent_id"], 11);
    assert_eq!(init["order_id"], ORDER_ID);
    assert_eq!(init["amount"], 50_000);
    assert_eq!(init["currency"], "INR");
    assert_eq!(init["key_id"], CHECKOUT_KEY_ID);
    assert_eq!(init["provider"], "mock");
    assert!(init["provider_order_id"].as_str().is_some_and(|s| s.starts_with("order_")));
}

#[actix_web::test]
async fn only_the_owner_can_pay() {
    let _ = env_logger::try_init().ok();
    let token = token_for("sam", vec![Role::Staff]);
    let mut backends = owned_by("alice");
    backends.payments.expect_insert_payment_intent().never();
    let path = format!("/orders/{ORDER_ID}/payment/initiate");
    let (status, _) = post_request(&token, &path, json!({"amount": 50_000}), |cfg| {
        backends.register(cfg);
        cfg.service(InitiatePaymentRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn amount_must_match_the_order_total() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = owned_by("alice");
    backends.payments.expect_insert_payment_intent().never();
    let path = format!("/orders/{ORDER_ID}/payment/initiate");
    let (status, body) = post_request(&token, &path, json!({"amount": 100}), |cfg| {
        backends.register(cfg);
        cfg.service(InitiatePaymentRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("does not match the order total"), "{body}");
}

fn verification_backends(owner: &'static str) -> Backends {
    let mut backends = owned_by(owner);
    backends.payments.expect_fetch_payment_intent().returning(|po| Ok(Some(live_intent(ORDER_ID, po))));
    backends
}

#[actix_web::test]
async fn verified_payments_confirm_the_order() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let (payment_id, signature) = checkout_provider().simulate_checkout(PROVIDER_ORDER_ID);
    let mut backends = verification_backends("alice");
    let expected_payment_id = payment_id.clone();
    backends
        .payments
        .expect_capture_payment()
        .withf(move |po, pay, _| po.to_string() == PROVIDER_ORDER_ID && pay.to_string() == expected_payment_id)
        .times(1)
        .returning(|po, pay, _| {
            let mut order = sample_order(ORDER_ID, "alice", OrderStatusType::Confirmed);
            order.payment_status = PaymentStatus::Paid;
            let mut intent = live_intent(ORDER_ID, po);
            intent.status = PaymentIntentStatus::Captured;
            intent.payment_id = Some(pay.to_string());
            let status_change = StatusChange {
                order: order.clone(),
                previous_status: OrderStatusType::Pending,
                update: tracking_entry(ORDER_ID, 1, OrderStatusType::Confirmed, "Payment received. Order confirmed"),
            };
            Ok(PaymentCaptured { order, intent, status_change: Some(status_change), newly_captured: true })
        });
    backends.payments.expect_insert_notification().times(2).returning(|n| Ok(stored_notification(5, n)));
    let body = json!({"provider_order_id": PROVIDER_ORDER_ID, "payment_id": payment_id, "signature": signature});
    let (status, body) = post_request(&token, "/orders/payment/verify", body, |cfg| {
        backends.register(cfg);
        cfg.service(VerifyPaymentRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = json_body(&body);
    assert_eq!(order["payment_status"], "PAID");
    assert_eq!(order["status"], "CONFIRMED");
}

#[actix_web::test]
async fn forged_signatures_change_nothing() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = verification_backends("alice");
    backends.payments.expect_capture_payment().never();
    backends.payments.expect_insert_notification().never();
    let body = json!({"provider_order_id": PROVIDER_ORDER_ID, "payment_id": "pay_forged", "signature": "00".repeat(32)});
    let (status, body) = post_request(&token, "/orders/payment/verify", body, |cfg| {
        backends.register(cfg);
        cfg.service(VerifyPaymentRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("The payment signature is invalid"), "{body}");
}

#[actix_web::test]
async fn someone_elses_intent_looks_missing() {
    let _ = env_logger::try_init().ok();
    let token = token_for("mallory", vec![Role::User]);
    let (payment_id, signature) = checkout_provider().simulate_checkout(PROVIDER_ORDER_ID);
    let mut backends = verification_backends("alice");
    backends.payments.expect_capture_payment().never();
    let body = json!({"provider_order_id": PROVIDER_ORDER_ID, "payment_id": payment_id, "signature": signature});
    let (status, _) = post_request(&token, "/orders/payment/verify", body, |cfg| {
        backends.register(cfg);
        cfg.service(VerifyPaymentRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_intents() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends.payments.expect_fetch_payment_intent().returning(|_| Ok(None));
    let body = json!({"provider_order_id": "order_nope", "payment_id": "pay_1", "signature": "ab"});
    let (status, body) = post_request(&token, "/orders/payment/verify", body, |cfg| {
        backends.register(cfg);
        cfg.service(VerifyPaymentRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("No payment intent exists for provider order order_nope"), "{body}");
}
