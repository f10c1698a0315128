//! Post-commit side effects shared by the APIs: owner notifications and event publication.
//!
//! These run after the database transaction has been committed. A failure here is logged and swallowed; the change
//! itself has already happened and must not be reported as failed.
use log::*;

use crate::{
    db_types::{NewNotification, Notification, NotificationPriority, NotificationType, Order, OrderStatusType},
    events::{EventProducers, NotificationCreatedEvent, OrderStatusChangedEvent, PaymentUpdatedEvent},
    traits::{NotificationManagement, StatusChange},
};

pub(crate) fn status_notification(change: &StatusChange) -> NewNotification {
    let status = change.update.status;
    let title = match status {
        OrderStatusType::Pending => "Order placed",
        OrderStatusType::Confirmed => "Order confirmed",
        OrderStatusType::Processing => "Order processing",
        OrderStatusType::Packed => "Order packed",
        OrderStatusType::Shipped => "Order shipped",
        OrderStatusType::OutForDelivery => "Out for delivery",
        OrderStatusType::Delivered => "Order delivered",
        OrderStatusType::Cancelled => "Order cancelled",
        OrderStatusType::Returned => "Order returned",
    };
    let priority = match status {
        OrderStatusType::Cancelled | OrderStatusType::OutForDelivery => NotificationPriority::High,
        _ => NotificationPriority::Normal,
    };
    let message = format!("Order {}: {}", change.order.order_id, change.update.message);
    NewNotification::for_order(&change.order, NotificationType::Order, title, message).with_priority(priority)
}

pub(crate) async fn notify<B: NotificationManagement>(
    db: &B,
    producers: &EventProducers,
    notification: NewNotification,
) -> Option<Notification> {
    let user_id = notification.user_id.clone();
    match db.insert_notification(notification).await {
        Ok(saved) => {
            for emitter in &producers.notification_created_producer {
                emitter.publish_event(NotificationCreatedEvent::new(saved.clone())).await;
            }
            Some(saved)
        },
        Err(e) => {
            error!("📬️ Could not store a notification for user {user_id}: {e}");
            None
        },
    }
}

pub(crate) async fn publish_status_change<B: NotificationManagement>(
    db: &B,
    producers: &EventProducers,
    change: &StatusChange,
) {
    trace!("📬️ Publishing status change for {}", change.order.order_id);
    for emitter in &producers.status_changed_producer {
        let event = OrderStatusChangedEvent::new(change.order.clone(), change.previous_status, change.update.clone());
        emitter.publish_event(event).await;
    }
    notify(db, producers, status_notification(change)).await;
}

pub(crate) async fn publish_payment_update(producers: &EventProducers, order: &Order, payment_id: Option<String>) {
    trace!("📬️ Publishing payment update for {}", order.order_id);
    for emitter in &producers.payment_updated_producer {
        emitter.publish_event(PaymentUpdatedEvent::new(order, payment_id.clone())).await;
    }
}
