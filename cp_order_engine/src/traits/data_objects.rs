use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, OrderTrackingUpdate, PaymentIntent};

/// The outcome of a committed status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub order: Order,
    pub previous_status: OrderStatusType,
    pub update: OrderTrackingUpdate,
}

/// The outcome of a committed payment capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCaptured {
    pub order: Order,
    pub intent: PaymentIntent,
    /// Set when the capture also moved the order out of `PENDING`.
    pub status_change: Option<StatusChange>,
    /// `false` if the intent had already been captured with the same payment id and nothing was written.
    pub newly_captured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub order: Order,
    pub intent: PaymentIntent,
}
