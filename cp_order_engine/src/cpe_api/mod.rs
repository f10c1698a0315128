//! # Order engine public API
//!
//! * [`order_flow_api`] creates orders and drives them through the fulfilment pipeline.
//! * [`payment_api`] runs the payment confirmation flow against a [`crate::traits::PaymentProvider`].
//! * [`notification_api`] reads user notifications and toggles their read state.
//!
//! Each API is generic over the storage traits it needs, so it can be backed by [`crate::SqliteDatabase`] or by a
//! mock in tests:
//!
//! ```rust,ignore
//! use cp_order_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new(5).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.create_order("user-17", cart).await?;
//! ```
pub mod errors;
pub mod notification_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
pub mod payment_objects;

mod notifier;
