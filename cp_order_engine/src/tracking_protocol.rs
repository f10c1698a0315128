//! # Tracking channel wire protocol
//!
//! Every frame on the real-time tracking channel is a JSON text frame of the form
//!
//! ```json
//! {"event": "order:update", "data": {"order_id": "CP-20241019-7QX2MD", "status": "SHIPPED", ...}}
//! ```
//!
//! Server to client: `order:update`, `notification:new`, `payment:update` and `error`.
//! Client to server: `order:subscribe`, `order:unsubscribe`, `notification:read` and `notification:read-all`.
//!
//! Delivery is best-effort and at most once. There are no acknowledgements, sequence numbers or replays; a client that
//! missed something fetches the order over REST.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Notification, NotificationType, OrderId, OrderStatusType, OrderTrackingUpdate, PaymentStatus},
    events::{NotificationCreatedEvent, OrderStatusChangedEvent, PaymentUpdatedEvent},
};

pub const ORDER_UPDATE: &str = "order:update";
pub const NOTIFICATION_NEW: &str = "notification:new";
pub const PAYMENT_UPDATE: &str = "payment:update";
pub const ERROR: &str = "error";
pub const ORDER_SUBSCRIBE: &str = "order:subscribe";
pub const ORDER_UNSUBSCRIBE: &str = "order:unsubscribe";
pub const NOTIFICATION_READ: &str = "notification:read";
pub const NOTIFICATION_READ_ALL: &str = "notification:read-all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdatePayload {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl From<&OrderTrackingUpdate> for OrderUpdatePayload {
    fn from(update: &OrderTrackingUpdate) -> Self {
        Self {
            order_id: update.order_id.clone(),
            status: update.status,
            message: update.message.clone(),
            timestamp: update.created_at,
            location: update.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: i64,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            notification_type: n.notification_type,
            title: n.title.clone(),
            message: n.message.clone(),
            timestamp: n.created_at,
            is_read: n.is_read,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdatePayload {
    pub order_id: OrderId,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "order:update")]
    OrderUpdate(OrderUpdatePayload),
    #[serde(rename = "notification:new")]
    NotificationNew(NotificationPayload),
    #[serde(rename = "payment:update")]
    PaymentUpdate(PaymentUpdatePayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::OrderUpdate(_) => ORDER_UPDATE,
            Self::NotificationNew(_) => NOTIFICATION_NEW,
            Self::PaymentUpdate(_) => PAYMENT_UPDATE,
            Self::Error(_) => ERROR,
        }
    }

    /// The order an event is about, if any. Subscription filtering is keyed on this.
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            Self::OrderUpdate(p) => Some(&p.order_id),
            Self::PaymentUpdate(p) => Some(&p.order_id),
            Self::NotificationNew(_) | Self::Error(_) => None,
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error(ErrorPayload { message: message.into() })
    }

    pub fn to_json(&self) -> String {
        // Every payload is a plain struct of strings, numbers and timestamps, so serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| format!(r#"{{"event":"{}"}}"#, self.event_name()))
    }
}

impl From<&OrderStatusChangedEvent> for ServerMessage {
    fn from(event: &OrderStatusChangedEvent) -> Self {
        Self::OrderUpdate(OrderUpdatePayload::from(&event.update))
    }
}

impl From<&PaymentUpdatedEvent> for ServerMessage {
    fn from(event: &PaymentUpdatedEvent) -> Self {
        Self::PaymentUpdate(PaymentUpdatePayload {
            order_id: event.order_id.clone(),
            payment_status: event.payment_status,
            payment_id: event.payment_id.clone(),
            timestamp: event.timestamp,
        })
    }
}

impl From<&NotificationCreatedEvent> for ServerMessage {
    fn from(event: &NotificationCreatedEvent) -> Self {
        Self::NotificationNew(NotificationPayload::from(&event.notification))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRef {
    pub id: i64,
}

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "order:subscribe")]
    Subscribe(OrderRef),
    #[serde(rename = "order:unsubscribe")]
    Unsubscribe(OrderRef),
    #[serde(rename = "notification:read")]
    NotificationRead(NotificationRef),
    #[serde(rename = "notification:read-all")]
    NotificationReadAll,
}

impl ClientMessage {
    pub fn subscribe(order_id: OrderId) -> Self {
        Self::Subscribe(OrderRef { order_id })
    }

    pub fn unsubscribe(order_id: OrderId) -> Self {
        Self::Unsubscribe(OrderRef { order_id })
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => ORDER_SUBSCRIBE,
            Self::Unsubscribe(_) => ORDER_UNSUBSCRIBE,
            Self::NotificationRead(_) => NOTIFICATION_READ,
            Self::NotificationReadAll => NOTIFICATION_READ_ALL,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!(r#"{{"event":"{}"}}"#, self.event_name()))
    }
}
