use thiserror::Error;

use crate::{
    db_types::{Money, OrderId, OrderStatusType, StatusTransitionError},
    helpers::PricingError,
    traits::{PaymentProviderError, StorageError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderFlowError {
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] PricingError),
    #[error("Order {0} cannot move from {1} to {2}")]
    InvalidTransition(OrderId, OrderStatusType, OrderStatusType),
    #[error("Order {0} has status {1} and can no longer be modified")]
    OrderImmutable(OrderId, OrderStatusType),
    #[error("Order {0} already has status {1}")]
    NoOp(OrderId, OrderStatusType),
    #[error("A cancellation reason is required")]
    MissingReason,
}

impl OrderFlowError {
    pub fn from_storage(order_id: &OrderId, e: StorageError) -> Self {
        match e {
            StorageError::OrderNotFound(id) => Self::OrderNotFound(id),
            StorageError::Transition(t) => Self::from_transition(order_id, t),
            e => Self::StorageError(e.to_string()),
        }
    }

    pub fn from_transition(order_id: &OrderId, e: StatusTransitionError) -> Self {
        match e {
            StatusTransitionError::NoOp(s) => Self::NoOp(order_id.clone(), s),
            StatusTransitionError::Immutable(s) => Self::OrderImmutable(order_id.clone(), s),
            StatusTransitionError::Invalid { from, to } => Self::InvalidTransition(order_id.clone(), from, to),
        }
    }
}

impl From<StorageError> for OrderFlowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::OrderNotFound(id) => Self::OrderNotFound(id),
            e => Self::StorageError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentApiError {
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} has already been paid for")]
    AlreadyPaid(OrderId),
    #[error("Order {0} has status {1} and cannot be paid for")]
    OrderNotPayable(OrderId, OrderStatusType),
    #[error("Payment amount {requested} does not match the order total of {total}")]
    AmountMismatch { requested: Money, total: Money },
    #[error("No payment intent exists for provider order {0}")]
    IntentNotFound(String),
    #[error("The payment intent for provider order {0} is no longer live")]
    IntentNotLive(String),
    #[error("The payment signature is invalid")]
    InvalidSignature,
    #[error("Payment provider error: {0}")]
    ProviderError(#[from] PaymentProviderError),
}

impl From<StorageError> for PaymentApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::OrderNotFound(id) => Self::OrderNotFound(id),
            StorageError::PaymentIntentNotFound(id) => Self::IntentNotFound(id),
            StorageError::PaymentIntentNotLive(id) => Self::IntentNotLive(id),
            StorageError::OrderNotPayable(id, status) => Self::OrderNotPayable(id, status),
            e => Self::StorageError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationApiError {
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Notification {0} does not exist")]
    NotificationNotFound(i64),
}

impl From<StorageError> for NotificationApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotificationNotFound(id) => Self::NotificationNotFound(id),
            e => Self::StorageError(e.to_string()),
        }
    }
}
