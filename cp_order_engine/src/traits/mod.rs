//! # Storage and provider contracts
//!
//! The APIs in [`crate::cpe_api`] never talk to a database directly. They are generic over the traits in this module,
//! and any backend that implements them can sit behind the order service. [`crate::SqliteDatabase`] is the bundled
//! backend.
//!
//! * [`OrderManagement`] stores orders and their tracking log, and applies status transitions atomically.
//! * [`PaymentManagement`] stores payment intents and commits payment results against orders.
//! * [`NotificationManagement`] stores user notifications and their read state.
//! * [`PaymentProvider`] is the seam to the external payment provider (order creation and checkout signatures).
mod data_objects;
mod errors;
mod notification_management;
mod order_management;
mod payment_management;
mod payment_provider;

pub use data_objects::{PaymentCaptured, PaymentFailed, StatusChange};
pub use errors::StorageError;
pub use notification_management::NotificationManagement;
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
pub use payment_provider::{PaymentProvider, PaymentProviderError, ProviderOrder};
