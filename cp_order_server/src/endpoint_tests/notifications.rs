use actix_web::http::StatusCode;
use cp_order_engine::{db_types::Role, traits::StorageError};
use serde_json::{json, Value};

use super::helpers::{get_request, notification, patch_request, token_for, Backends};
use crate::routes::{MarkAllNotificationsReadRoute, MarkNotificationReadRoute, MyNotificationsRoute};

type Mock = super::mocks::MockBackend;

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).expect("Response is not JSON")
}

#[actix_web::test]
async fn my_notifications_with_unread_count() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends
        .notifications
        .expect_fetch_notifications_for_user()
        .withf(|user, unread_only| user.to_string() == "alice" && *unread_only)
        .returning(|user, _| Ok(vec![notification(2, user, "Order shipped", false)]));
    backends.notifications.expect_count_unread_notifications().returning(|_| Ok(1));
    let (status, body) = get_request(&token, "/notifications?unread_only=true", |cfg| {
        backends.register(cfg);
        cfg.service(MyNotificationsRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let list = json_body(&body);
    assert_eq!(list["unread_count"], 1);
    assert_eq!(list["notifications"][0]["title"], "Order shipped");
    assert_eq!(list["notifications"][0]["is_read"], false);
}

#[actix_web::test]
async fn all_notifications_by_default() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends
        .notifications
        .expect_fetch_notifications_for_user()
        .withf(|_, unread_only| !*unread_only)
        .returning(|user, _| {
            Ok(vec![notification(2, user, "Order shipped", false), notification(1, user, "Order confirmed", true)])
        });
    backends.notifications.expect_count_unread_notifications().returning(|_| Ok(1));
    let (status, body) = get_request(&token, "/notifications", |cfg| {
        backends.register(cfg);
        cfg.service(MyNotificationsRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["notifications"].as_array().map(|a| a.len()), Some(2));
}

#[actix_web::test]
async fn mark_one_read() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends
        .notifications
        .expect_mark_notification_read()
        .withf(|user, id| user.to_string() == "alice" && *id == 4)
        .returning(|user, id| Ok(notification(id, user, "Payment successful", true)));
    let (status, body) = patch_request(&token, "/notifications/4/read", json!({}), |cfg| {
        backends.register(cfg);
        cfg.service(MarkNotificationReadRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let n = json_body(&body);
    assert_eq!(n["id"], 4);
    assert_eq!(n["is_read"], true);
}

#[actix_web::test]
async fn other_users_notifications_are_not_found() {
    let _ = env_logger::try_init().ok();
    let token = token_for("mallory", vec![Role::User]);
    let mut backends = Backends::default();
    backends.notifications.expect_mark_notification_read().returning(|_, id| Err(StorageError::NotificationNotFound(id)));
    let (status, body) = patch_request(&token, "/notifications/4/read", json!({}), |cfg| {
        backends.register(cfg);
        cfg.service(MarkNotificationReadRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Notification 4"), "{body}");
}

#[actix_web::test]
async fn mark_all_read() {
    let _ = env_logger::try_init().ok();
    let token = token_for("alice", vec![Role::User]);
    let mut backends = Backends::default();
    backends.notifications.expect_mark_all_notifications_read().times(1).returning(|_| Ok(3));
    let (status, body) = patch_request(&token, "/notifications/read-all", json!({}), |cfg| {
        backends.register(cfg);
        cfg.service(MarkAllNotificationsReadRoute::<Mock>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"updated": 3}));
}
