use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use cp_common::Secret;
use cp_order_engine::{
    db_types::{OrderStatusType, PaymentIntentStatus, PaymentStatus},
    traits::{PaymentCaptured, PaymentFailed, StorageError},
};
use razorpay_tools::webhook_signature;
use serde_json::{json, Value};

use super::helpers::{live_intent, sample_order, stored_notification, Backends};
use crate::{
    middleware::{HmacMiddlewareFactory, RAZORPAY_SIGNATURE_HEADER},
    routes::RazorpayWebhookRoute,
};

const WEBHOOK_SECRET: &str = "webhook-tests-only-secret";
const ORDER_ID: &str = "CP-20241019-7QX2MD";
const PROVIDER_ORDER_ID: &str = "order_Lx3kQ9ZtW2mP0a";

type Mock = super::mocks::MockBackend;

fn event(name: &str) -> String {
    json!({
        "entity": "event",
        "event": name,
        "contains": ["payment"],
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_Webhook0001",
                    "entity": "payment",
                    "order_id": PROVIDER_ORDER_ID,
                    "amount": 50_000,
                    "currency": "INR",
                    "status": "captured",
                    "method": "upi",
                    "captured": true,
                    "created_at": 1_729_330_000
                }
            }
        },
        "created_at": 1_729_330_005
    })
    .to_string()
}

async fn call_webhook(body: String, signature: Option<String>, backends: Backends) -> Result<(StatusCode, Value), String> {
    let _ = env_logger::try_init().ok();
    let hmac = HmacMiddlewareFactory::new(RAZORPAY_SIGNATURE_HEADER, Secret::new(WEBHOOK_SECRET.to_string()), true);
    let app = App::new().service(
        web::scope("/webhooks")
            .wrap(hmac)
            .configure(|cfg| {
                backends.register(cfg);
                cfg.service(RazorpayWebhookRoute::<Mock>::new());
            }),
    );
    let service = test::init_service(app).await;
    let mut req = TestRequest::post().uri("/webhooks/razorpay").insert_header(("Content-Type", "application/json"));
    if let Some(sig) = signature {
        req = req.insert_header((RAZORPAY_SIGNATURE_HEADER, sig));
    }
    let req = req.set_payload(body).to_request();
    let res = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?;
    let status = res.status();
    let body = test::read_body(res).await;
    Ok((status, serde_json::from_slice(&body).unwrap_or(Value::Null)))
}

#[actix_web::test]
async fn captured_payments_are_committed() {
    let mut backends = Backends::default();
    backends
        .payments
        .expect_capture_payment()
        .withf(|po, pay, _| po.to_string() == PROVIDER_ORDER_ID && pay.to_string() == "pay_Webhook0001")
        .times(1)
        .returning(|po, pay, _| {
            let mut order = sample_order(ORDER_ID, "alice", OrderStatusType::Confirmed);
            order.payment_status = PaymentStatus::Paid;
            let mut intent = live_intent(ORDER_ID, po);
            intent.status = PaymentIntentStatus::Captured;
            intent.payment_id = Some(pay.to_string());
            Ok(PaymentCaptured { order, intent, status_change: None, newly_captured: true })
        });
    backends.payments.expect_insert_notification().times(1).returning(|n| Ok(stored_notification(9, n)));
    let body = event("payment.captured");
    let signature = webhook_signature(WEBHOOK_SECRET, body.as_bytes());
    let (status, reply) = call_webhook(body, Some(signature), backends).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["success"], true);
    assert_eq!(reply["message"], format!("Order {ORDER_ID} payment status is PAID"));
}

#[actix_web::test]
async fn failed_payments_are_recorded() {
    let mut backends = Backends::default();
    backends
        .payments
        .expect_fail_payment()
        .withf(|po, pay| po.to_string() == PROVIDER_ORDER_ID && pay.as_deref() == Some("pay_Webhook0001"))
        .times(1)
        .returning(|po, _| {
            let mut order = sample_order(ORDER_ID, "alice", OrderStatusType::Pending);
            order.payment_status = PaymentStatus::Failed;
            let mut intent = live_intent(ORDER_ID, po);
            intent.status = PaymentIntentStatus::Failed;
            Ok(PaymentFailed { order, intent })
        });
    backends.payments.expect_insert_notification().times(1).returning(|n| Ok(stored_notification(10, n)));
    let body = event("payment.failed");
    let signature = webhook_signature(WEBHOOK_SECRET, body.as_bytes());
    let (status, reply) = call_webhook(body, Some(signature), backends).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["message"], format!("Order {ORDER_ID} payment status is FAILED"));
}

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let mut backends = Backends::default();
    backends.payments.expect_capture_payment().never();
    let err = call_webhook(event("payment.captured"), None, backends).await.expect_err("Request should have failed");
    assert_eq!(err, "No HMAC signature found.");

    let mut backends = Backends::default();
    backends.payments.expect_capture_payment().never();
    let body = event("payment.captured");
    let signature = webhook_signature("someone-elses-secret", body.as_bytes());
    let err = call_webhook(body, Some(signature), backends).await.expect_err("Request should have failed");
    assert_eq!(err, "Invalid HMAC signature.");
}

#[actix_web::test]
async fn unknown_intents_are_acknowledged() {
    let mut backends = Backends::default();
    backends
        .payments
        .expect_capture_payment()
        .returning(|po, _, _| Err(StorageError::PaymentIntentNotFound(po.to_string())));
    let body = event("payment.captured");
    let signature = webhook_signature(WEBHOOK_SECRET, body.as_bytes());
    let (status, reply) = call_webhook(body, Some(signature), backends).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["success"], false);
}

#[actix_web::test]
async fn other_events_are_ignored() {
    let mut backends = Backends::default();
    backends.payments.expect_capture_payment().never();
    backends.payments.expect_fail_payment().never();
    let body = event("payment.authorized");
    let signature = webhook_signature(WEBHOOK_SECRET, body.as_bytes());
    let (status, reply) = call_webhook(body, Some(signature), backends).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["success"], false);
    assert_eq!(reply["message"], "Unhandled event payment.authorized");
}

#[actix_web::test]
async fn backend_failures_ask_for_a_retry() {
    let mut backends = Backends::default();
    backends
        .payments
        .expect_capture_payment()
        .returning(|_, _, _| Err(StorageError::DatabaseError("disk I/O error".into())));
    let body = event("payment.captured");
    let signature = webhook_signature(WEBHOOK_SECRET, body.as_bytes());
    let (status, _) = call_webhook(body, Some(signature), backends).await.expect("Request failed");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
