use thiserror::Error;

use crate::{db_types::OrderId, traits::StorageError};

/// Driver-level failures raised by the functions in [`super::db`].
#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database driver error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not run database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("Stored data is corrupt: {0}")]
    CorruptData(String),
}

impl From<SqliteDatabaseError> for StorageError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::DuplicateOrder(id) => StorageError::DuplicateOrder(id),
            e => StorageError::DatabaseError(e.to_string()),
        }
    }
}
