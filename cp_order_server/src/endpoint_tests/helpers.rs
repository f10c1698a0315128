use actix_web::{
    http::{header::AUTHORIZATION, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, TimeZone, Utc};
use cp_common::Secret;
use cp_order_engine::{
    db_types::{
        DeliveryAddress,
        Money,
        NewNotification,
        NewPaymentIntent,
        Notification,
        NotificationPriority,
        NotificationType,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        OrderTotals,
        OrderTrackingUpdate,
        PaymentIntent,
        PaymentIntentStatus,
        PaymentStatus,
        Role,
    },
    events::EventProducers,
    providers::LocalPaymentProvider,
    NotificationApi,
    OrderFlowApi,
    PaymentApi,
};
use log::debug;

use super::mocks::MockBackend;
use crate::{
    auth::{JwtClaims, TokenIssuer, TokenValidator},
    config::AuthConfig,
    integrations::ServerPaymentProvider,
    middleware::JwtMiddlewareFactory,
};

pub const CHECKOUT_KEY_ID: &str = "rzp_test_endpoint";
pub const CHECKOUT_SECRET: &str = "endpoint-checkout-secret";

// A test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-only-c5f1a0e2b7d94c3e8a6f")
}

pub fn issue_token(claims: JwtClaims) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(&claims).expect("Failed to sign token")
}

pub fn token_for(user_id: &str, roles: Vec<Role>) -> String {
    issue_token(JwtClaims::new(user_id, roles, Duration::hours(1)))
}

pub fn checkout_provider() -> LocalPaymentProvider {
    LocalPaymentProvider::new(CHECKOUT_KEY_ID, Secret::new(CHECKOUT_SECRET.to_string()))
}

/// One mock backend per API. Each route only touches the APIs it takes as `web::Data`.
#[derive(Default)]
pub struct Backends {
    pub orders: MockBackend,
    pub payments: MockBackend,
    pub notifications: MockBackend,
}

impl Backends {
    pub fn register(self, cfg: &mut ServiceConfig) {
        cfg.app_data(web::Data::new(OrderFlowApi::new(self.orders, EventProducers::default())))
            .app_data(web::Data::new(PaymentApi::new(
                self.payments,
                ServerPaymentProvider::Local(checkout_provider()),
                EventProducers::default(),
            )))
            .app_data(web::Data::new(NotificationApi::new(self.notifications)));
    }
}

pub async fn send(
    req: TestRequest,
    token: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = req;
    if !token.is_empty() {
        req = req.insert_header((AUTHORIZATION, format!("Bearer {token}")));
    }
    let req = req.to_request();
    let validator = TokenValidator::new(&get_auth_config());
    let app = App::new().service(web::scope("").wrap(JwtMiddlewareFactory::new(validator)).configure(configure));
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?;
    let status = res.status();
    let body = test::read_body(res).await;
    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

pub async fn get_request(
    token: &str,
    path: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send(TestRequest::get().uri(path), token, configure).await
}

pub async fn post_request(
    token: &str,
    path: &str,
    body: serde_json::Value,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send(TestRequest::post().uri(path).set_json(body), token, configure).await
}

pub async fn patch_request(
    token: &str,
    path: &str,
    body: serde_json::Value,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send(TestRequest::patch().uri(path).set_json(body), token, configure).await
}

//------------------------------------------  Fixtures  ------------------------------------------

pub fn address() -> DeliveryAddress {
    DeliveryAddress {
        recipient: "Asha Rao".into(),
        phone: "+91 98450 00000".into(),
        line1: "14 MG Road".into(),
        line2: None,
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        postal_code: "560001".into(),
    }
}

pub fn sample_order(order_id: &str, user_id: &str, status: OrderStatusType) -> Order {
    let ts = Utc.with_ymd_and_hms(2024, 10, 19, 9, 30, 0).unwrap();
    Order {
        id: 1,
        order_id: OrderId::from(order_id),
        user_id: user_id.to_string(),
        items: vec![OrderItem::new("MED-1", "Paracetamol 500mg", 2, Money::from_rupees(250))],
        status,
        payment_status: PaymentStatus::Pending,
        totals: OrderTotals {
            subtotal: Money::from_rupees(500),
            discount: Money::default(),
            delivery_fee: Money::default(),
            tax: Money::default(),
            total: Money::from_rupees(500),
        },
        delivery_address: address(),
        delivery_slot: None,
        prescription_id: None,
        cancellation_reason: None,
        created_at: ts,
        updated_at: ts,
    }
}

pub fn tracking_entry(order_id: &str, id: i64, status: OrderStatusType, message: &str) -> OrderTrackingUpdate {
    OrderTrackingUpdate {
        id,
        order_id: OrderId::from(order_id),
        status,
        message: message.to_string(),
        location: None,
        created_at: Utc.with_ymd_and_hms(2024, 10, 19, 10, 0, 0).unwrap(),
    }
}

pub fn stored_notification(id: i64, n: NewNotification) -> Notification {
    Notification {
        id,
        user_id: n.user_id,
        notification_type: n.notification_type,
        title: n.title,
        message: n.message,
        is_read: false,
        priority: n.priority,
        order_id: n.order_id,
        created_at: Utc::now(),
    }
}

pub fn notification(id: i64, user_id: &str, title: &str, is_read: bool) -> Notification {
    Notification {
        id,
        user_id: user_id.to_string(),
        notification_type: NotificationType::Order,
        title: title.to_string(),
        message: format!("{title} message"),
        is_read,
        priority: NotificationPriority::Normal,
        order_id: None,
        created_at: Utc.with_ymd_and_hms(2024, 10, 19, 11, 0, id as u32).unwrap(),
    }
}

pub fn stored_intent(id: i64, new: NewPaymentIntent) -> PaymentIntent {
    let now = Utc::now();
    PaymentIntent {
        id,
        order_id: new.order_id,
        provider: new.provider,
        provider_order_id: new.provider_order_id,
        amount: new.amount,
        currency: new.currency,
        status: PaymentIntentStatus::Created,
        payment_id: None,
        created_at: now,
        expires_at: new.expires_at,
        updated_at: now,
    }
}

pub fn live_intent(order_id: &str, provider_order_id: &str) -> PaymentIntent {
    let now = Utc::now();
    PaymentIntent {
        id: 7,
        order_id: OrderId::from(order_id),
        provider: "mock".into(),
        provider_order_id: provider_order_id.to_string(),
        amount: Money::from_rupees(500),
        currency: "INR".into(),
        status: PaymentIntentStatus::Created,
        payment_id: None,
        created_at: now,
        expires_at: now + Duration::minutes(15),
        updated_at: now,
    }
}
