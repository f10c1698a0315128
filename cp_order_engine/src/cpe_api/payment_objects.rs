use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Money, OrderId};

/// Everything the client needs to open the provider's checkout widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    pub intent_id: i64,
    pub order_id: OrderId,
    pub provider: String,
    pub provider_order_id: String,
    pub amount: Money,
    pub currency: String,
    /// The provider's public key id.
    pub key_id: String,
    pub expires_at: DateTime<Utc>,
}

/// What the checkout widget hands back after a successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub provider_order_id: String,
    pub payment_id: String,
    pub signature: String,
}
