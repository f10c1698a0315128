use cp_order_engine::{
    db_types::{Money, OrderId},
    traits::{PaymentProvider, PaymentProviderError, ProviderOrder},
};
use log::*;
use razorpay_tools::{RazorpayApi, RazorpayApiError, RazorpayConfig};

use crate::config::PaymentConfig;

pub const RAZORPAY_PROVIDER_NAME: &str = "razorpay";

#[derive(Clone)]
pub struct RazorpayProvider {
    api: RazorpayApi,
}

impl std::fmt::Debug for RazorpayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RazorpayProvider({})", self.api.key_id())
    }
}

impl RazorpayProvider {
    pub fn new(api: RazorpayApi) -> Self {
        Self { api }
    }

    pub fn from_config(config: &PaymentConfig) -> Result<Self, PaymentProviderError> {
        let mut rzp_config = RazorpayConfig::new(config.key_id.as_str(), config.key_secret.reveal().as_str())
            .with_webhook_secret(config.webhook_secret.reveal().as_str());
        if let Ok(url) = std::env::var("CP_RAZORPAY_API_URL") {
            rzp_config.api_url = url;
        }
        let api = RazorpayApi::new(rzp_config).map_err(|e| PaymentProviderError::Configuration(e.to_string()))?;
        Ok(Self::new(api))
    }
}

impl PaymentProvider for RazorpayProvider {
    fn name(&self) -> &str {
        RAZORPAY_PROVIDER_NAME
    }

    fn key_id(&self) -> &str {
        self.api.key_id()
    }

    async fn create_provider_order(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<ProviderOrder, PaymentProviderError> {
        let order = self.api.create_order(amount, currency, order_id.as_str()).await.map_err(|e| {
            warn!("💳️ Razorpay order creation for {order_id} failed. {e}");
            match e {
                RazorpayApiError::QueryError { status, message } if status < 500 => {
                    PaymentProviderError::Rejected(format!("{status}: {message}"))
                },
                RazorpayApiError::InvalidAmount(a) => PaymentProviderError::Rejected(format!("Invalid amount {a}")),
                RazorpayApiError::Initialization(s) => PaymentProviderError::Configuration(s),
                e => PaymentProviderError::RequestFailed(e.to_string()),
            }
        })?;
        Ok(ProviderOrder { provider_order_id: order.id, amount: Money::from(order.amount), currency: order.currency })
    }

    fn verify_payment_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str) -> bool {
        self.api.verify_checkout_signature(provider_order_id, payment_id, signature)
    }
}
