//! A payment provider that never leaves the process.
//!
//! Provider order ids are generated locally, and checkout signatures are ordinary HMAC-SHA256 signatures over
//! `"{provider_order_id}|{payment_id}"` using the configured secret, the same scheme the real provider uses. Use
//! [`LocalPaymentProvider::simulate_checkout`] to play the part of the checkout widget in development and tests.
use cp_common::Secret;
use log::debug;
use rand::{distributions::Alphanumeric, Rng};

use crate::{
    db_types::{Money, OrderId},
    helpers::{sign_payment, verify_payment_signature},
    traits::{PaymentProvider, PaymentProviderError, ProviderOrder},
};

pub const LOCAL_PROVIDER_NAME: &str = "mock";

#[derive(Debug, Clone)]
pub struct LocalPaymentProvider {
    key_id: String,
    key_secret: Secret<String>,
}

impl LocalPaymentProvider {
    pub fn new<S: Into<String>>(key_id: S, key_secret: Secret<String>) -> Self {
        Self { key_id: key_id.into(), key_secret }
    }

    fn random_id(prefix: &str) -> String {
        let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(14).map(char::from).collect();
        format!("{prefix}_{suffix}")
    }

    /// Produces what a successful checkout would hand back: a fresh payment id and a valid signature.
    pub fn simulate_checkout(&self, provider_order_id: &str) -> (String, String) {
        let payment_id = Self::random_id("pay");
        let signature = sign_payment(self.key_secret.reveal(), provider_order_id, &payment_id);
        (payment_id, signature)
    }
}

impl Default for LocalPaymentProvider {
    fn default() -> Self {
        Self::new("mock_key", Secret::new("mock_secret".to_string()))
    }
}

impl PaymentProvider for LocalPaymentProvider {
    fn name(&self) -> &str {
        LOCAL_PROVIDER_NAME
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_provider_order(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<ProviderOrder, PaymentProviderError> {
        if amount.value() <= 0 {
            return Err(PaymentProviderError::Rejected(format!("Amount must be positive, got {amount}")));
        }
        let provider_order_id = Self::random_id("order");
        debug!("💳️ Local provider order {provider_order_id} created for {order_id}");
        Ok(ProviderOrder { provider_order_id, amount, currency: currency.to_string() })
    }

    fn verify_payment_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(self.key_secret.reveal(), provider_order_id, payment_id, signature)
    }
}
