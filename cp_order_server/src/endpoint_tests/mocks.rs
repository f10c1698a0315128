use chrono::{DateTime, Utc};
use cp_order_engine::{
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
        TrackingNote,
    },
    order_objects::OrderQueryFilter,
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
use mockall::mock;

mock! {
    pub Backend {}
    impl OrderManagement for Backend {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, StorageError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;
        async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, StorageError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorageError>;
        async fn update_order_status(
            &self,
            order_id: &OrderId,
            new_status: OrderStatusType,
            note: TrackingNote,
            cancellation_reason: Option<String>,
        ) -> Result<StatusChange, StorageError>;
        async fn fetch_tracking_updates(&self, order_id: &OrderId) -> Result<Vec<OrderTrackingUpdate>, StorageError>;
    }
    impl PaymentManagement for Backend {
        async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<(PaymentIntent, Vec<PaymentIntent>), StorageError>;
        async fn fetch_payment_intent(&self, provider_order_id: &str) -> Result<Option<PaymentIntent>, StorageError>;
        async fn fetch_payment_intents_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentIntent>, StorageError>;
        async fn capture_payment(&self, provider_order_id: &str, payment_id: &str, now: DateTime<Utc>) -> Result<PaymentCaptured, StorageError>;
        async fn fail_payment(&self, provider_order_id: &str, payment_id: Option<String>) -> Result<PaymentFailed, StorageError>;
        async fn expire_payment_intents(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>, StorageError>;
    }
    impl NotificationManagement for Backend {
        async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, StorageError>;
        async fn fetch_notifications_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>, StorageError>;
        async fn count_unread_notifications(&self, user_id: &str) -> Result<i64, StorageError>;
        async fn mark_notification_read(&self, user_id: &str, id: i64) -> Result<Notification, StorageError>;
        async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, StorageError>;
    }
}
