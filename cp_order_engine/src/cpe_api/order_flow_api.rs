use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    cpe_api::{
        errors::OrderFlowError,
        notifier::publish_status_change,
        order_objects::OrderQueryFilter,
    },
    db_types::{CartSnapshot, NewOrder, Order, OrderId, OrderStatusType, OrderTrackingUpdate, TrackingNote},
    events::{EventProducers, OrderCreatedEvent},
    helpers::{new_order_number, PricingPolicy},
    traits::{NotificationManagement, OrderManagement, StorageError},
};

/// `OrderFlowApi` creates orders from checkout submissions and moves them through the fulfilment pipeline.
///
/// Every status change goes through the transition table in [`OrderStatusType::check_transition`], is committed
/// together with its tracking entry, and is then announced: the owner gets a notification and the
/// `on_order_status_changed` hook fires.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    pricing: PricingPolicy,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.pricing)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, pricing: PricingPolicy::default() }
    }

    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + NotificationManagement
{
    /// Creates a `PENDING` order from a checkout submission.
    ///
    /// The cart is validated and priced here; clients cannot supply totals. No tracking entry is written, since the
    /// log records changes and creation is not one.
    pub async fn create_order(&self, user_id: &str, cart: CartSnapshot) -> Result<Order, OrderFlowError> {
        let totals = self.pricing.calculate(&cart.items, cart.discount)?;
        let mut new_order = NewOrder::new(new_order_number(Utc::now()), user_id.to_string(), cart, totals);
        let order = match self.db.insert_order(new_order.clone()).await {
            Err(StorageError::DuplicateOrder(id)) => {
                warn!("🔄️📦️ Order number {id} collided. Trying once more with a fresh number.");
                new_order.order_id = new_order_number(Utc::now());
                self.db.insert_order(new_order).await?
            },
            result => result?,
        };
        info!("🔄️📦️ Order {} created for user {user_id}. Total {}", order.order_id, order.totals.total);
        for emitter in &self.producers.order_created_producer {
            emitter.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?;
        Ok(order)
    }

    pub async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.fetch_orders_for_user(user_id).await?;
        Ok(orders)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        trace!("🔄️🔍️ Searching orders: {query}");
        let orders = self.db.search_orders(query).await?;
        Ok(orders)
    }

    /// Moves an order to `new_status`.
    ///
    /// | From \ To    | next stage | other stage     | CANCELLED / RETURNED | same   |
    /// |--------------|------------|-----------------|----------------------|--------|
    /// | non-terminal | ok         | InvalidTransition | ok                 | NoOp   |
    /// | terminal     | OrderImmutable | OrderImmutable | OrderImmutable    | NoOp   |
    ///
    /// On success the tracking entry carries `note.message`, or the default message for the new status.
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        note: TrackingNote,
    ) -> Result<Order, OrderFlowError> {
        self.change_status(order_id, new_status, note, None).await
    }

    /// Cancels the order, storing the reason. The tracking message is `Order cancelled: <reason>`.
    ///
    /// Refunds and stock release are not triggered from here.
    pub async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, OrderFlowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OrderFlowError::MissingReason);
        }
        let note = TrackingNote::default().with_message(format!("Order cancelled: {reason}"));
        self.change_status(order_id, OrderStatusType::Cancelled, note, Some(reason.to_string())).await
    }

    async fn change_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        note: TrackingNote,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        trace!("🔄️🚚️ Order {order_id} is being moved to {new_status}");
        let change = self
            .db
            .update_order_status(order_id, new_status, note, reason)
            .await
            .map_err(|e| OrderFlowError::from_storage(order_id, e))?;
        info!("🔄️🚚️ Order {order_id}: {} -> {new_status}", change.previous_status);
        publish_status_change(&self.db, &self.producers, &change).await;
        Ok(change.order)
    }

    /// The tracking log, in append order.
    pub async fn track(&self, order_id: &OrderId) -> Result<Vec<OrderTrackingUpdate>, OrderFlowError> {
        if self.db.fetch_order(order_id).await?.is_none() {
            return Err(OrderFlowError::OrderNotFound(order_id.clone()));
        }
        let updates = self.db.fetch_tracking_updates(order_id).await?;
        Ok(updates)
    }
}
