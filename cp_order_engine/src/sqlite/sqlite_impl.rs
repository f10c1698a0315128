//! `SqliteDatabase` is the bundled backend of the order engine. It implements every storage trait in
//! [`crate::traits`].
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{
    db::{db_url, new_pool, notifications, orders, payment_intents, tracking},
    SqliteDatabaseError,
};
use crate::{
    cpe_api::order_objects::OrderQueryFilter,
    db_types::{
        NewNotification,
        NewOrder,
        NewPaymentIntent,
        Notification,
        Order,
        OrderId,
        OrderStatusType,
        OrderTrackingUpdate,
        PaymentIntent,
        PaymentIntentStatus,
        PaymentStatus,
        TrackingNote,
    },
    traits::{
        NotificationManagement,
        OrderManagement,
        PaymentCaptured,
        PaymentFailed,
        PaymentManagement,
        StatusChange,
        StorageError,
    },
};

/// The tracking message written when a captured payment confirms a pending order.
pub const PAYMENT_CONFIRMED_MESSAGE: &str = "Payment received. Order confirmed";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Connects to the database given by `CP_DATABASE_URL`, or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_existing_order(
        order_id: &OrderId,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<Order, StorageError> {
        orders::fetch_order_by_order_id(order_id, conn)
            .await?
            .ok_or_else(|| StorageError::OrderNotFound(order_id.clone()))
    }

    /// Checks the transition, writes the new status and appends the tracking entry. Runs inside the caller's
    /// transaction.
    async fn apply_status_change(
        order: &Order,
        new_status: OrderStatusType,
        message: &str,
        location: Option<&str>,
        cancellation_reason: Option<&str>,
        now: DateTime<Utc>,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<OrderTrackingUpdate, StorageError> {
        order.status.check_transition(new_status)?;
        orders::update_order_status(&order.order_id, new_status, cancellation_reason, now, conn).await?;
        let update = tracking::append_tracking_update(&order.order_id, new_status, message, location, now, conn).await?;
        Ok(update)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorageError> {
        let mut tx = self.pool.begin().await?;
        orders::insert_order(&order, &mut tx).await?;
        let saved = Self::fetch_existing_order(&order.order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::search_orders(query, &mut conn).await?;
        Ok(result)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        note: TrackingNote,
        cancellation_reason: Option<String>,
    ) -> Result<StatusChange, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        // Deferred transaction: write before reading, or a racing writer fails instead of waiting its turn
        orders::claim_order(order_id, &mut tx).await?;
        let order = Self::fetch_existing_order(order_id, &mut tx).await?;
        let previous_status = order.status;
        let message = note.message.unwrap_or_else(|| new_status.default_message().to_string());
        let update = Self::apply_status_change(
            &order,
            new_status,
            &message,
            note.location.as_deref(),
            cancellation_reason.as_deref(),
            now,
            &mut tx,
        )
        .await?;
        if new_status.is_terminal() {
            // A checkout opened before this change must not be able to pay for the order afterwards
            let voided = payment_intents::supersede_live_intents(order_id, now, &mut tx).await?;
            if !voided.is_empty() {
                info!("🗃️ {} live payment intent(s) for {order_id} voided by the move to {new_status}", voided.len());
            }
        }
        let order = Self::fetch_existing_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} moved from {previous_status} to {new_status}");
        Ok(StatusChange { order, previous_status, update })
    }

    async fn fetch_tracking_updates(&self, order_id: &OrderId) -> Result<Vec<OrderTrackingUpdate>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = tracking::fetch_tracking_updates(order_id, &mut conn).await?;
        Ok(result)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment_intent(
        &self,
        intent: NewPaymentIntent,
    ) -> Result<(PaymentIntent, Vec<PaymentIntent>), StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let superseded = payment_intents::supersede_live_intents(&intent.order_id, now, &mut tx).await?;
        let intent = payment_intents::insert_payment_intent(intent, now, &mut tx).await?;
        tx.commit().await?;
        Ok((intent, superseded))
    }

    async fn fetch_payment_intent(&self, provider_order_id: &str) -> Result<Option<PaymentIntent>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let intent = payment_intents::fetch_by_provider_order_id(provider_order_id, &mut conn).await?;
        Ok(intent)
    }

    async fn fetch_payment_intents_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentIntent>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let intents = payment_intents::fetch_for_order(order_id, &mut conn).await?;
        Ok(intents)
    }

    async fn capture_payment(
        &self,
        provider_order_id: &str,
        payment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentCaptured, StorageError> {
        let mut tx = self.pool.begin().await?;
        payment_intents::claim_intent(provider_order_id, &mut tx).await?;
        let intent = payment_intents::fetch_by_provider_order_id(provider_order_id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::PaymentIntentNotFound(provider_order_id.to_string()))?;
        match intent.status {
            PaymentIntentStatus::Captured if intent.payment_id.as_deref() == Some(payment_id) => {
                debug!("🗃️ Payment {payment_id} was already captured. Nothing to do.");
                let order = Self::fetch_existing_order(&intent.order_id, &mut tx).await?;
                tx.commit().await?;
                return Ok(PaymentCaptured { order, intent, status_change: None, newly_captured: false });
            },
            PaymentIntentStatus::Created => {},
            _ => return Err(StorageError::PaymentIntentNotLive(provider_order_id.to_string())),
        }
        let order = Self::fetch_existing_order(&intent.order_id, &mut tx).await?;
        if order.status.is_terminal() {
            warn!("🗃️ Refusing to capture payment {payment_id}. Order {} is {}.", order.order_id, order.status);
            return Err(StorageError::OrderNotPayable(order.order_id, order.status));
        }
        let intent =
            payment_intents::update_status(intent.id, PaymentIntentStatus::Captured, Some(payment_id), now, &mut tx)
                .await?;
        orders::update_payment_status(&order.order_id, PaymentStatus::Paid, now, &mut tx).await?;
        let status_change = if order.status == OrderStatusType::Pending {
            let update = Self::apply_status_change(
                &order,
                OrderStatusType::Confirmed,
                PAYMENT_CONFIRMED_MESSAGE,
                None,
                None,
                now,
                &mut tx,
            )
            .await?;
            Some((order.status, update))
        } else {
            None
        };
        let order = Self::fetch_existing_order(&intent.order_id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Payment {payment_id} captured for order {}", order.order_id);
        let status_change = status_change.map(|(previous_status, update)| StatusChange {
            order: order.clone(),
            previous_status,
            update,
        });
        Ok(PaymentCaptured { order, intent, status_change, newly_captured: true })
    }

    async fn fail_payment(
        &self,
        provider_order_id: &str,
        payment_id: Option<String>,
    ) -> Result<PaymentFailed, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        payment_intents::claim_intent(provider_order_id, &mut tx).await?;
        let intent = payment_intents::fetch_by_provider_order_id(provider_order_id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::PaymentIntentNotFound(provider_order_id.to_string()))?;
        if intent.status != PaymentIntentStatus::Created {
            return Err(StorageError::PaymentIntentNotLive(provider_order_id.to_string()));
        }
        let order = Self::fetch_existing_order(&intent.order_id, &mut tx).await?;
        if order.status.is_terminal() {
            warn!("🗃️ Ignoring failed payment for {provider_order_id}. Order {} is {}.", order.order_id, order.status);
            return Err(StorageError::OrderNotPayable(order.order_id, order.status));
        }
        let intent =
            payment_intents::update_status(intent.id, PaymentIntentStatus::Failed, payment_id.as_deref(), now, &mut tx)
                .await?;
        if order.payment_status != PaymentStatus::Paid {
            orders::update_payment_status(&order.order_id, PaymentStatus::Failed, now, &mut tx).await?;
        }
        let order = Self::fetch_existing_order(&intent.order_id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Payment for provider order {provider_order_id} failed. Order {} updated.", order.order_id);
        Ok(PaymentFailed { order, intent })
    }

    async fn expire_payment_intents(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let expired = payment_intents::expire_stale_intents(now, &mut conn).await?;
        Ok(expired)
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::insert_notification(notification, Utc::now(), &mut conn).await?;
        Ok(result)
    }

    async fn fetch_notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::fetch_notifications_for_user(user_id, unread_only, &mut conn).await?;
        Ok(result)
    }

    async fn count_unread_notifications(&self, user_id: &str) -> Result<i64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::count_unread(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn mark_notification_read(&self, user_id: &str, id: i64) -> Result<Notification, StorageError> {
        let mut tx = self.pool.begin().await?;
        if !notifications::mark_read(user_id, id, &mut tx).await? {
            return Err(StorageError::NotificationNotFound(id));
        }
        let notification =
            notifications::fetch_notification(user_id, id, &mut tx).await?.ok_or(StorageError::NotificationNotFound(id))?;
        tx.commit().await?;
        Ok(notification)
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::mark_all_read(user_id, &mut conn).await?;
        Ok(result)
    }
}
