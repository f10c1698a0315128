use crate::{
    cpe_api::order_objects::OrderQueryFilter,
    db_types::{NewOrder, Order, OrderId, OrderStatusType, OrderTrackingUpdate, TrackingNote},
    traits::{StatusChange, StorageError},
};

/// Storage for orders and their append-only tracking log.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order and its items in a single transaction. The order starts in `PENDING` with a `PENDING`
    /// payment status. Returns [`StorageError::DuplicateOrder`] if the order number is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorageError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    /// All orders placed by `user_id`, newest first.
    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, StorageError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorageError>;

    /// Checks the transition table against the stored status and, in the same transaction, overwrites the status and
    /// appends a tracking entry. `cancellation_reason` is stored alongside the change when given. A move to a terminal
    /// status also supersedes every live payment intent of the order.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        note: TrackingNote,
        cancellation_reason: Option<String>,
    ) -> Result<StatusChange, StorageError>;

    /// The tracking log for the order, in the order the entries were appended.
    async fn fetch_tracking_updates(&self, order_id: &OrderId) -> Result<Vec<OrderTrackingUpdate>, StorageError>;
}
