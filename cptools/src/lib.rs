//! Client-side tools for the CarePoint order service.
//!
//! * [`client::OrderServerClient`]: the REST API.
//! * [`tracking::TrackingChannel`]: the real-time order tracking channel, with reconnects and local event fan-out.
//! * [`payment_flow::PaymentFlow`]: the three-step payment confirmation flow over a [`payment_flow::CheckoutWidget`].
pub mod client;
pub mod formatting;
pub mod payment_flow;
pub mod tracking;
pub mod widgets;
