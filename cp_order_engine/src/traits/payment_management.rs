use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewPaymentIntent, OrderId, PaymentIntent},
    traits::{PaymentCaptured, PaymentFailed, StorageError},
};

/// Storage for payment intents, and the atomic commits that apply a payment result to an order.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Stores a new `CREATED` intent. Any other `CREATED` intent for the same order is marked `SUPERSEDED` in the same
    /// transaction, so an order never has two live intents. Returns the new intent and the superseded ones.
    async fn insert_payment_intent(
        &self,
        intent: NewPaymentIntent,
    ) -> Result<(PaymentIntent, Vec<PaymentIntent>), StorageError>;

    async fn fetch_payment_intent(&self, provider_order_id: &str) -> Result<Option<PaymentIntent>, StorageError>;

    async fn fetch_payment_intents_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentIntent>, StorageError>;

    /// In one transaction: the intent becomes `CAPTURED` with `payment_id`, the order's payment status becomes `PAID`,
    /// and a `PENDING` order advances to `CONFIRMED` with a tracking entry.
    ///
    /// Capturing an intent that is already `CAPTURED` with the same payment id is a no-op that returns the current
    /// state. Any other non-`CREATED` intent yields [`StorageError::PaymentIntentNotLive`], and an order that is
    /// delivered, cancelled or returned yields [`StorageError::OrderNotPayable`] without any write.
    async fn capture_payment(
        &self,
        provider_order_id: &str,
        payment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentCaptured, StorageError>;

    /// Marks a live intent `FAILED`. The order's payment status becomes `FAILED` unless it is already `PAID`.
    /// Terminal orders are left alone and yield [`StorageError::OrderNotPayable`].
    async fn fail_payment(
        &self,
        provider_order_id: &str,
        payment_id: Option<String>,
    ) -> Result<PaymentFailed, StorageError>;

    /// Marks every `CREATED` intent whose `expires_at` is before `now` as `EXPIRED` and returns them.
    async fn expire_payment_intents(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>, StorageError>;
}
