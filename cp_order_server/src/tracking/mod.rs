//! The real-time tracking hub.
//!
//! Clients open a WebSocket on the tracking port, optionally presenting the same JWT the REST API uses, and subscribe
//! to the orders they want to follow. Committed order and payment changes reach the hub through the engine's event
//! hooks and are forwarded to the subscribed connections. New notifications go to every connection of the user they
//! belong to.
//!
//! See [`cp_order_engine::tracking_protocol`] for the frame format.
mod hub;
mod socket;

pub use hub::{ConnectionId, TrackingHub};
pub use socket::{run_tracking_listener, TrackingContext};
