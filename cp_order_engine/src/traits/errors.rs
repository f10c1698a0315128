use thiserror::Error;

use crate::db_types::{OrderId, OrderStatusType, StatusTransitionError};

/// Backend-agnostic storage failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid query: {0}")]
    QueryError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("Notification {0} does not exist")]
    NotificationNotFound(i64),
    #[error("No payment intent exists for provider order {0}")]
    PaymentIntentNotFound(String),
    #[error("Payment intent for provider order {0} is no longer live")]
    PaymentIntentNotLive(String),
    #[error("Order {0} has status {1} and cannot take payments")]
    OrderNotPayable(OrderId, OrderStatusType),
    #[error(transparent)]
    Transition(#[from] StatusTransitionError),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}
