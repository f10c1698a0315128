use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Money, OrderId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentProviderError {
    #[error("The payment provider is not configured correctly: {0}")]
    Configuration(String),
    #[error("Could not reach the payment provider: {0}")]
    RequestFailed(String),
    #[error("The payment provider rejected the request: {0}")]
    Rejected(String),
}

/// The provider-side order that a checkout is completed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub provider_order_id: String,
    pub amount: Money,
    pub currency: String,
}

/// The seam between the payment flow and an external payment provider.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    /// A short, stable name stored with every payment intent, e.g. `razorpay`.
    fn name(&self) -> &str;

    /// The public key id the checkout widget needs. Never the secret.
    fn key_id(&self) -> &str;

    async fn create_provider_order(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<ProviderOrder, PaymentProviderError>;

    /// Checks the signature returned by the checkout widget. Must compare in constant time.
    fn verify_payment_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str) -> bool;
}
