//! Checkout widgets usable from a terminal.
use cp_common::Secret;
use cp_order_engine::{
    payment_objects::{PaymentInitiation, PaymentVerification},
    providers::LocalPaymentProvider,
};
use dialoguer::Input;

use crate::payment_flow::{CheckoutError, CheckoutWidget};

/// Completes checkouts against a server running the `mock` payment provider, signing with the shared secret.
/// Development only.
pub struct SimulatedCheckout {
    key_secret: Secret<String>,
}

impl SimulatedCheckout {
    pub fn new(key_secret: Secret<String>) -> Self {
        Self { key_secret }
    }
}

impl CheckoutWidget for SimulatedCheckout {
    async fn checkout(&self, initiation: &PaymentInitiation) -> Result<PaymentVerification, CheckoutError> {
        let provider = LocalPaymentProvider::new(initiation.key_id.clone(), self.key_secret.clone());
        let (payment_id, signature) = provider.simulate_checkout(&initiation.provider_order_id);
        Ok(PaymentVerification { provider_order_id: initiation.provider_order_id.clone(), payment_id, signature })
    }
}

/// Prints the checkout details and asks for the payment id and signature the provider's checkout returned.
pub struct PromptCheckout;

impl CheckoutWidget for PromptCheckout {
    async fn checkout(&self, initiation: &PaymentInitiation) -> Result<PaymentVerification, CheckoutError> {
        println!("Complete the checkout with these details:");
        println!("  provider:       {}", initiation.provider);
        println!("  key id:         {}", initiation.key_id);
        println!("  provider order: {}", initiation.provider_order_id);
        println!("  amount:         {} {}", initiation.amount, initiation.currency);
        println!("  expires at:     {}", initiation.expires_at);
        let payment_id = prompt("Payment id (leave empty to abandon)")?;
        if payment_id.is_empty() {
            return Err(CheckoutError::Dismissed);
        }
        let signature = prompt("Signature")?;
        Ok(PaymentVerification { provider_order_id: initiation.provider_order_id.clone(), payment_id, signature })
    }
}

fn prompt(text: &str) -> Result<String, CheckoutError> {
    Input::<String>::new()
        .with_prompt(text)
        .allow_empty(true)
        .interact_text()
        .map(|s| s.trim().to_string())
        .map_err(|e| CheckoutError::Failed(e.to_string()))
}
