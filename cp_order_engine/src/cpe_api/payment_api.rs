use std::fmt::Debug;

use chrono::{Duration, Utc};
use cp_common::CURRENCY_CODE;
use log::*;

use crate::{
    cpe_api::{
        errors::PaymentApiError,
        notifier::{notify, publish_payment_update, publish_status_change},
        payment_objects::{PaymentInitiation, PaymentVerification},
    },
    db_types::{
        Money,
        NewNotification,
        NewPaymentIntent,
        NotificationPriority,
        NotificationType,
        Order,
        OrderId,
        PaymentIntent,
        PaymentIntentStatus,
        PaymentStatus,
    },
    events::EventProducers,
    traits::{NotificationManagement, OrderManagement, PaymentCaptured, PaymentManagement, PaymentProvider},
};

pub const DEFAULT_INTENT_TTL_MINUTES: i64 = 15;

/// The server side of the three-step payment confirmation flow.
///
/// 1. [`Self::initiate_payment`] creates a provider order and a live payment intent for it.
/// 2. The client completes checkout in the provider's widget (not handled here).
/// 3. [`Self::verify_payment`] checks the signature the widget returned and, only if it is valid, commits the payment.
///
/// An order never has more than one live intent. Starting a new payment supersedes the previous one.
pub struct PaymentApi<B, P> {
    db: B,
    provider: P,
    producers: EventProducers,
    intent_ttl: Duration,
}

impl<B, P> Debug for PaymentApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi (intent ttl: {})", self.intent_ttl)
    }
}

impl<B, P> PaymentApi<B, P> {
    pub fn new(db: B, provider: P, producers: EventProducers) -> Self {
        Self { db, provider, producers, intent_ttl: Duration::minutes(DEFAULT_INTENT_TTL_MINUTES) }
    }

    pub fn with_intent_ttl(mut self, ttl: Duration) -> Self {
        self.intent_ttl = ttl;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<B, P> PaymentApi<B, P>
where
    B: OrderManagement + PaymentManagement + NotificationManagement,
    P: PaymentProvider,
{
    /// Step 1. Creates a provider order for the full order total and stores it as the order's only live intent.
    ///
    /// Fails if the order is already paid, is in a terminal state, or if `amount` is not the order total.
    pub async fn initiate_payment(&self, order_id: &OrderId, amount: Money) -> Result<PaymentInitiation, PaymentApiError> {
        let order = self.fetch_order(order_id).await?;
        if order.payment_status == PaymentStatus::Paid {
            return Err(PaymentApiError::AlreadyPaid(order_id.clone()));
        }
        if order.status.is_terminal() {
            return Err(PaymentApiError::OrderNotPayable(order_id.clone(), order.status));
        }
        if amount != order.totals.total {
            return Err(PaymentApiError::AmountMismatch { requested: amount, total: order.totals.total });
        }
        let provider_order = self.provider.create_provider_order(order_id, amount, CURRENCY_CODE).await?;
        debug!(
            "💳️ {} created provider order {} for {order_id}",
            self.provider.name(),
            provider_order.provider_order_id
        );
        let new_intent = NewPaymentIntent {
            order_id: order_id.clone(),
            provider: self.provider.name().to_string(),
            provider_order_id: provider_order.provider_order_id,
            amount: provider_order.amount,
            currency: provider_order.currency,
            expires_at: Utc::now() + self.intent_ttl,
        };
        let (intent, superseded) = self.db.insert_payment_intent(new_intent).await?;
        for old in &superseded {
            info!("💳️ Payment intent {} for {order_id} superseded by {}", old.provider_order_id, intent.provider_order_id);
        }
        Ok(PaymentInitiation {
            intent_id: intent.id,
            order_id: intent.order_id,
            provider: intent.provider,
            provider_order_id: intent.provider_order_id,
            amount: intent.amount,
            currency: intent.currency,
            key_id: self.provider.key_id().to_string(),
            expires_at: intent.expires_at,
        })
    }

    /// Looks up the intent a verification refers to. Callers use this to check ownership before verifying.
    pub async fn fetch_intent(&self, provider_order_id: &str) -> Result<PaymentIntent, PaymentApiError> {
        self.db
            .fetch_payment_intent(provider_order_id)
            .await?
            .ok_or_else(|| PaymentApiError::IntentNotFound(provider_order_id.to_string()))
    }

    pub async fn intents_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentIntent>, PaymentApiError> {
        let intents = self.db.fetch_payment_intents_for_order(order_id).await?;
        Ok(intents)
    }

    /// Step 3. Verifies the checkout signature and commits the payment.
    ///
    /// Nothing is written when verification fails. The order keeps its payment status and the intent stays live, so
    /// a forged callback cannot cancel someone else's checkout. Re-submitting an already captured payment returns the
    /// order unchanged.
    pub async fn verify_payment(&self, verification: PaymentVerification) -> Result<Order, PaymentApiError> {
        let PaymentVerification { provider_order_id, payment_id, signature } = verification;
        let now = Utc::now();
        let intent = self.fetch_intent(&provider_order_id).await?;
        let already_captured =
            intent.status == PaymentIntentStatus::Captured && intent.payment_id.as_deref() == Some(payment_id.as_str());
        if !already_captured && !intent.is_live(now) {
            warn!("💳️ Verification for {provider_order_id} refused. The intent is {}", intent.status);
            return Err(PaymentApiError::IntentNotLive(provider_order_id));
        }
        if !self.provider.verify_payment_signature(&provider_order_id, &payment_id, &signature) {
            warn!("💳️ Invalid payment signature for {provider_order_id} / {payment_id}. Nothing was changed.");
            return Err(PaymentApiError::InvalidSignature);
        }
        let captured = self.db.capture_payment(&provider_order_id, &payment_id, now).await?;
        self.after_capture(&captured, &payment_id).await;
        Ok(captured.order)
    }

    /// Commits a capture reported by the provider's webhook. The webhook body signature has already been checked.
    pub async fn capture_from_webhook(&self, provider_order_id: &str, payment_id: &str) -> Result<Order, PaymentApiError> {
        let captured = self.db.capture_payment(provider_order_id, payment_id, Utc::now()).await?;
        self.after_capture(&captured, payment_id).await;
        Ok(captured.order)
    }

    /// Records a failure reported by the provider's webhook.
    pub async fn fail_from_webhook(
        &self,
        provider_order_id: &str,
        payment_id: Option<String>,
    ) -> Result<Order, PaymentApiError> {
        let failed = self.db.fail_payment(provider_order_id, payment_id.clone()).await?;
        let order = failed.order;
        warn!("💳️ Payment for order {} failed at the provider", order.order_id);
        publish_payment_update(&self.producers, &order, payment_id).await;
        let notification = NewNotification::for_order(
            &order,
            NotificationType::Payment,
            "Payment failed",
            format!("Your payment of {} for order {} did not go through. Please try again.", order.totals.total, order.order_id),
        )
        .with_priority(NotificationPriority::High);
        notify(&self.db, &self.producers, notification).await;
        Ok(order)
    }

    /// Marks every live intent past its expiry time as `EXPIRED`.
    pub async fn expire_intents(&self) -> Result<Vec<PaymentIntent>, PaymentApiError> {
        let expired = self.db.expire_payment_intents(Utc::now()).await?;
        Ok(expired)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentApiError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentApiError::OrderNotFound(order_id.clone()))
    }

    async fn after_capture(&self, captured: &PaymentCaptured, payment_id: &str) {
        if !captured.newly_captured {
            debug!("💳️ Payment {payment_id} was already captured");
            return;
        }
        let order = &captured.order;
        info!("💳️ Payment {payment_id} of {} captured for order {}", captured.intent.amount, order.order_id);
        publish_payment_update(&self.producers, order, Some(payment_id.to_string())).await;
        let notification = NewNotification::for_order(
            order,
            NotificationType::Payment,
            "Payment successful",
            format!("We received your payment of {} for order {}.", captured.intent.amount, order.order_id),
        );
        notify(&self.db, &self.producers, notification).await;
        if let Some(change) = &captured.status_change {
            publish_status_change(&self.db, &self.producers, change).await;
        }
    }
}
