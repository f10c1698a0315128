//! CarePoint order engine
//!
//! The order engine owns the order lifecycle of the CarePoint marketplace: pricing a checkout into an order, moving
//! the order through the fulfilment pipeline, confirming payments against an external provider, and telling the
//! customer about all of it. It is transport-agnostic; the REST server and the real-time tracking hub live in
//! `cp_order_server`.
//!
//! The library has three layers:
//! 1. Storage contracts ([`mod@traits`]) and the bundled SQLite backend ([`SqliteDatabase`]). Use the APIs instead of
//!    calling the backend directly.
//! 2. The public APIs ([`OrderFlowApi`], [`PaymentApi`], [`NotificationApi`]).
//! 3. Events ([`mod@events`]). Every committed change publishes an event that hooks can react to, and
//!    [`tracking_protocol`] turns those events into frames for connected clients.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod providers;
pub mod tracking_protocol;
pub mod traits;

mod cpe_api;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use cpe_api::{
    errors::{NotificationApiError, OrderFlowError, PaymentApiError},
    notification_api::NotificationApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::{PaymentApi, DEFAULT_INTENT_TTL_MINUTES},
    payment_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, SqliteDatabaseError};
