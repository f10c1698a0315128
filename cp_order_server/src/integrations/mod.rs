//! Payment provider selection.
//!
//! The `PaymentProvider` trait uses `async fn`, so it can't be a trait object. The server picks its provider once at
//! start-up and wraps it in [`ServerPaymentProvider`].
#[cfg(feature = "razorpay")]
pub mod razorpay;

use cp_order_engine::{
    db_types::{Money, OrderId},
    providers::LocalPaymentProvider,
    traits::{PaymentProvider, PaymentProviderError, ProviderOrder},
};
use log::*;

use crate::config::{PaymentConfig, ProviderKind};

#[derive(Debug, Clone)]
pub enum ServerPaymentProvider {
    Local(LocalPaymentProvider),
    #[cfg(feature = "razorpay")]
    Razorpay(razorpay::RazorpayProvider),
}

impl ServerPaymentProvider {
    pub fn from_config(config: &PaymentConfig) -> Result<Self, PaymentProviderError> {
        match config.provider {
            ProviderKind::Mock => {
                info!("💳️ Using the local mock payment provider");
                let provider = LocalPaymentProvider::new(config.key_id.clone(), config.key_secret.clone());
                Ok(Self::Local(provider))
            },
            #[cfg(feature = "razorpay")]
            ProviderKind::Razorpay => {
                info!("💳️ Using Razorpay as the payment provider (key id {})", config.key_id);
                razorpay::RazorpayProvider::from_config(config).map(Self::Razorpay)
            },
            #[cfg(not(feature = "razorpay"))]
            ProviderKind::Razorpay => Err(PaymentProviderError::Configuration(
                "This server was built without the razorpay feature".to_string(),
            )),
        }
    }
}

impl PaymentProvider for ServerPaymentProvider {
    fn name(&self) -> &str {
        match self {
            Self::Local(p) => p.name(),
            #[cfg(feature = "razorpay")]
            Self::Razorpay(p) => p.name(),
        }
    }

    fn key_id(&self) -> &str {
        match self {
            Self::Local(p) => p.key_id(),
            #[cfg(feature = "razorpay")]
            Self::Razorpay(p) => p.key_id(),
        }
    }

    async fn create_provider_order(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<ProviderOrder, PaymentProviderError> {
        match self {
            Self::Local(p) => p.create_provider_order(order_id, amount, currency).await,
            #[cfg(feature = "razorpay")]
            Self::Razorpay(p) => p.create_provider_order(order_id, amount, currency).await,
        }
    }

    fn verify_payment_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str) -> bool {
        match self {
            Self::Local(p) => p.verify_payment_signature(provider_order_id, payment_id, signature),
            #[cfg(feature = "razorpay")]
            Self::Razorpay(p) => p.verify_payment_signature(provider_order_id, payment_id, signature),
        }
    }
}
