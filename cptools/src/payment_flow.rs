//! Client driver for the three-step payment confirmation flow.
//!
//! 1. Ask the server to initiate a payment for the order total.
//! 2. Hand the provider order to a [`CheckoutWidget`] and wait for the customer to pay.
//! 3. Send the widget's result back to the server for signature verification.
//!
//! The flow is strictly linear. The first failing step ends it, and nothing is retried. The server never trusts the
//! client's word that a payment succeeded; only a verified signature moves the order to `PAID`.
use std::fmt::Display;

use cp_order_engine::{
    db_types::{Money, Order, OrderId},
    payment_objects::{PaymentInitiation, PaymentVerification},
};
use log::*;
use thiserror::Error;

use crate::client::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("The checkout was dismissed")]
    Dismissed,
    #[error("{0}")]
    Failed(String),
}

/// The provider's checkout UI.
#[allow(async_fn_in_trait)]
pub trait CheckoutWidget {
    /// Runs the checkout for `initiation` and returns what the provider hands back once the customer has paid.
    async fn checkout(&self, initiation: &PaymentInitiation) -> Result<PaymentVerification, CheckoutError>;
}

/// The server side of the flow.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn initiate_payment(&self, order_id: &OrderId, amount: Money) -> Result<PaymentInitiation, ClientError>;

    async fn verify_payment(&self, verification: &PaymentVerification) -> Result<Order, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStep {
    Initiate,
    Checkout,
    Verify,
}

impl Display for PaymentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initiate => write!(f, "initiate"),
            Self::Checkout => write!(f, "checkout"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PaymentFlowError {
    #[error("Could not start the payment. {0}")]
    Initiate(ClientError),
    #[error("Checkout did not complete. {0}")]
    Checkout(CheckoutError),
    #[error("Payment verification failed. {0}")]
    Verify(ClientError),
}

impl PaymentFlowError {
    pub fn step(&self) -> PaymentStep {
        match self {
            Self::Initiate(_) => PaymentStep::Initiate,
            Self::Checkout(_) => PaymentStep::Checkout,
            Self::Verify(_) => PaymentStep::Verify,
        }
    }
}

pub struct PaymentFlow<'a, G, W> {
    gateway: &'a G,
    widget: &'a W,
}

impl<'a, G, W> PaymentFlow<'a, G, W>
where
    G: PaymentGateway,
    W: CheckoutWidget,
{
    pub fn new(gateway: &'a G, widget: &'a W) -> Self {
        Self { gateway, widget }
    }

    /// Pays for `order` and returns the order as the server sees it after verification.
    pub async fn pay(&self, order: &Order) -> Result<Order, PaymentFlowError> {
        let order_id = &order.order_id;
        let initiation =
            self.gateway.initiate_payment(order_id, order.totals.total).await.map_err(PaymentFlowError::Initiate)?;
        info!("💳️ Payment of {} started for {order_id} ({})", initiation.amount, initiation.provider_order_id);

        let verification = self.widget.checkout(&initiation).await.map_err(PaymentFlowError::Checkout)?;
        if verification.provider_order_id != initiation.provider_order_id {
            let msg = format!(
                "The checkout completed provider order {} instead of {}",
                verification.provider_order_id, initiation.provider_order_id
            );
            return Err(PaymentFlowError::Checkout(CheckoutError::Failed(msg)));
        }
        debug!("💳️ Checkout returned payment {}", verification.payment_id);

        let order = self.gateway.verify_payment(&verification).await.map_err(PaymentFlowError::Verify)?;
        info!("💳️ Payment for {order_id} verified. Payment status is {}", order.payment_status);
        Ok(order)
    }
}
