//! # CarePoint order server
//! This crate hosts the network-facing side of the CarePoint order service. It is responsible for:
//! * The REST API for checking out, tracking and paying for orders, and for staff to move orders along the
//!   fulfilment pipeline.
//! * The real-time tracking hub, a WebSocket endpoint that pushes order, payment and notification events to
//!   connected clients.
//! * Receiving payment webhooks from Razorpay.
//! * Expiring payment intents that were never completed.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/*`: The authenticated REST API. Every request needs an `Authorization: Bearer <jwt>` header.
//! * `/webhooks/razorpay`: Payment webhooks. The body must carry a valid `X-Razorpay-Signature`.
//!
//! The tracking hub listens on its own port (`CP_WS_PORT`).
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod tracking;

#[cfg(test)]
mod endpoint_tests;
