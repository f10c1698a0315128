use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Notification, Order, OrderId, OrderStatusType, OrderTrackingUpdate, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published after a status change has been committed, together with the tracking entry that recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub previous_status: OrderStatusType,
    pub update: OrderTrackingUpdate,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, previous_status: OrderStatusType, update: OrderTrackingUpdate) -> Self {
        Self { order, previous_status, update }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdatedEvent {
    pub order_id: OrderId,
    pub user_id: String,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PaymentUpdatedEvent {
    pub fn new(order: &Order, payment_id: Option<String>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            user_id: order.user_id.clone(),
            payment_status: order.payment_status,
            payment_id,
            timestamp: order.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCreatedEvent {
    pub notification: Notification,
}

impl NotificationCreatedEvent {
    pub fn new(notification: Notification) -> Self {
        Self { notification }
    }
}
