use actix_web::http::StatusCode;
use cp_order_engine::{
    db_types::{OrderStatusType, Role, StatusTransitionError},
    traits::{StatusChange, StorageError},
};
use log::debug;
use serde_json::{json, Value};

use super::helpers::{
    get_request,
    patch_request,
    post_request,
    sample_order,
    stored_notification,
    token_for,
    tracking_entry,
    Backends,
};
use crate::routes::{
    CancelOrderRoute,
    CreateOrderRoute,
    MyOrdersRoute,
    OrderByIdRoute,
    OrdersSearchRoute,
    TrackOrderRoute,
    UpdateOrderStatusRoute,
};

const ORDER_ID: &str = "CP-20241019-7QX2MD";

type Mock = super::mocks::MockBackend;

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).expect("Response is not JSON")
}

#[actix_web::test]
async fn fetch_my_orders_without_a_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/orders", |cfg| {
        Backends::default().register(cfg);
        cfg.service(MyOrdersRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body)["error"], "Authentication Error. No access token was provided.");
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends
        .orders
        .expect_fetch_orders_for_user()
        .withf(|user_id| user_id.to_string() == "alice")
        .returning(|_| Ok(vec![sample_order(ORDER_ID, "alice", OrderStatusType::Pending)]));
    let (status, body) = get_request(&token, "/orders", |cfg| {
        backends.register(cfg);
        cfg.service(MyOrdersRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let orders = json_body(&body);
    assert_eq!(orders.as_array().map(|a| a.len()), Some(1));
    assert_eq!(orders[0]["order_id"], ORDER_ID);
    assert_eq!(orders[0]["status"], "PENDING");
    assert_eq!(orders[0]["totals"]["total"], 50_000);
}

#[actix_web::test]
async fn fetch_my_orders_with_a_tampered_token() {
    let _ = env_logger::try_init().ok();
    let mut token = token_for("alice", vec![Role::User]);
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    debug!("Calling /orders with invalid token {token}");
    let (status, body) = get_request(&token, "/orders", |cfg| {
        Backends::default().register(cfg);
        cfg.service(MyOrdersRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Access token is invalid"), "{body}");
}

#[actix_web::test]
async fn create_order_prices_the_cart_on_the_server() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends.orders.expect_insert_order().times(1).returning(|new_order| {
        let mut order = sample_order(new_order.order_id.as_str(), &new_order.user_id, OrderStatusType::Pending);
        order.items = new_order.items;
        order.totals = new_order.totals;
        Ok(order)
    });
    let cart = json!({
        "items": [{"product_id": "MED-9", "product_name": "Cough syrup", "quantity": 3, "unit_price": 6000}],
        "delivery_address": {
            "recipient": "Asha Rao", "phone": "+91 98450 00000", "line1": "14 MG Road",
            "city": "Bengaluru", "state": "Karnataka", "postal_code": "560001"
        },
        // client-side totals are not part of the cart and are ignored
        "total": 1
    });
    let (status, body) = post_request(&token, "/orders", cart, |cfg| {
        backends.register(cfg);
        cfg.service(CreateOrderRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order = json_body(&body);
    assert_eq!(order["user_id"], "alice");
    assert_eq!(order["totals"]["subtotal"], 18_000);
    assert_eq!(order["totals"]["delivery_fee"], 4_000);
    assert_eq!(order["totals"]["total"], 22_000);
}

#[actix_web::test]
async fn create_order_rejects_empty_carts() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends.orders.expect_insert_order().never();
    let cart = json!({
        "items": [],
        "delivery_address": {
            "recipient": "Asha Rao", "phone": "+91 98450 00000", "line1": "14 MG Road",
            "city": "Bengaluru", "state": "Karnataka", "postal_code": "560001"
        }
    });
    let (status, _) = post_request(&token, "/orders", cart, |cfg| {
        backends.register(cfg);
        cfg.service(CreateOrderRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn create_order_rejects_totals_that_overflow() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends.orders.expect_insert_order().never();
    let cart = json!({
        "items": [{"product_id": "MED-1", "product_name": "Paracetamol 500mg", "quantity": i64::MAX / 10, "unit_price": 100}],
        "delivery_address": {
            "recipient": "Asha Rao", "phone": "+91 98450 00000", "line1": "14 MG Road",
            "city": "Bengaluru", "state": "Karnataka", "postal_code": "560001"
        }
    });
    let (status, body) = post_request(&token, "/orders", cart, |cfg| {
        backends.register(cfg);
        cfg.service(CreateOrderRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body.contains("too large"), "{body}");
}

fn order_lookup(owner: &'static str) -> Backends {
    let mut backends = Backends::default();
    backends.orders.expect_fetch_order().returning(move |id| Ok(Some(sample_order(id.as_str(), owner, OrderStatusType::Processing))));
    backends
}

#[actix_web::test]
async fn owners_and_staff_can_fetch_an_order() {
    let _ = env_logger::try_init().ok();
    let path = format!("/orders/{ORDER_ID}");
    for token in [token_for("alice", vec![Role::User]), token_for("sam", vec![Role::Staff])] {
        let backends = order_lookup("alice");
        let (status, body) = get_request(&token, &path, |cfg| {
            backends.register(cfg);
            cfg.service(OrderByIdRoute::<Mock>::new());
        })
        .await
        .expect("Request failed");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["order_id"], ORDER_ID);
    }
}

#[actix_web::test]
async fn other_users_orders_look_missing() {
    let _ = env_logger::try_init().ok();
    let token = token_for("mallory", vec![Role::User]);
    let backends = order_lookup("alice");
    let (status, body) = get_request(&token, &format!("/orders/{ORDER_ID}"), |cfg| {
        backends.register(cfg);
        cfg.service(OrderByIdRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains(&format!("Order {ORDER_ID} does not exist")));
}

#[actix_web::test]
async fn customers_cannot_change_order_status() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends.orders.expect_update_order_status().never();
    let err = patch_request(&token, &format!("/orders/{ORDER_ID}/status"), json!({"status": "SHIPPED"}), |cfg| {
        backends.register(cfg);
        cfg.service(UpdateOrderStatusRoute::<Mock>::new());
    })
    .await
    .expect_err("Request should have failed");
    assert_eq!(err, "Insufficient permissions.");
}

#[actix_web::test]
async fn staff_move_orders_along() {
    let _ = env_logger::try_init().ok();
    let token = token_for("sam", vec![Role::Staff]);
    let mut backends = Backends::default();
    backends
        .orders
        .expect_update_order_status()
        .withf(|id, status, note, reason| {
            id.as_str() == ORDER_ID &&
                *status == OrderStatusType::Packed &&
                note.location.as_deref() == Some("WH-2") &&
                reason.is_none()
        })
        .returning(|id, status, _, _| {
            Ok(StatusChange {
                order: sample_order(id.as_str(), "alice", status),
                previous_status: OrderStatusType::Processing,
                update: tracking_entry(id.as_str(), 3, status, "Order packed"),
            })
        });
    backends.orders.expect_insert_notification().times(1).returning(|n| Ok(stored_notification(1, n)));
    let body = json!({"status": "PACKED", "location": "WH-2"});
    let (status, body) = patch_request(&token, &format!("/orders/{ORDER_ID}/status"), body, |cfg| {
        backends.register(cfg);
        cfg.service(UpdateOrderStatusRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "PACKED");
}

#[actix_web::test]
async fn illegal_transitions_conflict() {
    let _ = env_logger::try_init().ok();
    let token = token_for("root", vec![Role::Admin]);
    let mut backends = Backends::default();
    backends.orders.expect_update_order_status().returning(|_, to, _, _| {
        Err(StorageError::Transition(StatusTransitionError::Invalid { from: OrderStatusType::Pending, to }))
    });
    backends.orders.expect_insert_notification().never();
    let (status, body) = patch_request(&token, &format!("/orders/{ORDER_ID}/status"), json!({"status": "SHIPPED"}), |cfg| {
        backends.register(cfg);
        cfg.service(UpdateOrderStatusRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains(&format!("Order {ORDER_ID} cannot move from PENDING to SHIPPED")), "{body}");
}

#[actix_web::test]
async fn cancellation_needs_a_reason() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = order_lookup("alice");
    backends.orders.expect_update_order_status().never();
    let (status, body) = post_request(&token, &format!("/orders/{ORDER_ID}/cancel"), json!({"reason": "  "}), |cfg| {
        backends.register(cfg);
        cfg.service(CancelOrderRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("A cancellation reason is required"), "{body}");
}

#[actix_web::test]
async fn owners_cancel_their_orders() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = order_lookup("alice");
    backends
        .orders
        .expect_update_order_status()
        .withf(|_, status, note, reason| {
            *status == OrderStatusType::Cancelled &&
                note.message.as_deref() == Some("Order cancelled: Ordered the wrong strength") &&
                reason.as_deref() == Some("Ordered the wrong strength")
        })
        .returning(|id, status, note, reason| {
            let mut order = sample_order(id.as_str(), "alice", status);
            order.cancellation_reason = reason;
            Ok(StatusChange {
                order,
                previous_status: OrderStatusType::Processing,
                update: tracking_entry(id.as_str(), 4, status, note.message.as_deref().unwrap_or_default()),
            })
        });
    backends.orders.expect_insert_notification().returning(|n| Ok(stored_notification(2, n)));
    let body = json!({"reason": "Ordered the wrong strength"});
    let (status, body) = post_request(&token, &format!("/orders/{ORDER_ID}/cancel"), body, |cfg| {
        backends.register(cfg);
        cfg.service(CancelOrderRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order = json_body(&body);
    assert_eq!(order["status"], "CANCELLED");
    assert_eq!(order["cancellation_reason"], "Ordered the wrong strength");
}

#[actix_web::test]
async fn other_users_cannot_cancel() {
    let _ = env_logger::try_init().ok();
    let token = token_for("mallory", vec![Role::User]);
    let mut backends = order_lookup("alice");
    backends.orders.expect_update_order_status().never();
    let (status, _) = post_request(&token, &format!("/orders/{ORDER_ID}/cancel"), json!({"reason": "Because"}), |cfg| {
        backends.register(cfg);
        cfg.service(CancelOrderRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn tracking_log_in_order() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = order_lookup("alice");
    backends.orders.expect_fetch_tracking_updates().returning(|id| {
        Ok(vec![
            tracking_entry(id.as_str(), 1, OrderStatusType::Confirmed, "Order confirmed"),
            tracking_entry(id.as_str(), 2, OrderStatusType::Processing, "Order is being prepared"),
        ])
    });
    let (status, body) = get_request(&token, &format!("/orders/{ORDER_ID}/track"), |cfg| {
        backends.register(cfg);
        cfg.service(TrackOrderRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let log = json_body(&body);
    assert_eq!(log[0]["status"], "CONFIRMED");
    assert_eq!(log[1]["status"], "PROCESSING");
}

#[actix_web::test]
async fn search_is_for_staff() {
    let _ = env_logger::try_init().ok();
    let mut backends = Backends::default();
    backends
        .orders
        .expect_search_orders()
        .withf(|q| {
            q.user_id.as_deref() == Some("alice") &&
                q.status == Some(vec![OrderStatusType::Packed, OrderStatusType::Shipped])
        })
        .returning(|_| Ok(vec![sample_order(ORDER_ID, "alice", OrderStatusType::Shipped)]));
    let token = token_for("sam", vec![Role::Staff]);
    let (status, body) = get_request(&token, "/search/orders?user_id=alice&status=PACKED,SHIPPED", |cfg| {
        backends.register(cfg);
        cfg.service(OrdersSearchRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)[0]["status"], "SHIPPED");

    let token = token_for("alice", vec![Role::User]);
    let err = get_request(&token, "/search/orders?user_id=alice", |cfg| {
        Backends::default().register(cfg);
        cfg.service(OrdersSearchRoute::<Mock>::new());
    })
    .await
    .expect_err("Request should have failed");
    assert_eq!(err, "Insufficient permissions.");
}
