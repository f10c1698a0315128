mod api;
mod config;
mod data_objects;
mod error;
mod helpers;

pub use api::RazorpayApi;
pub use config::RazorpayConfig;
pub use data_objects::{NewRazorpayOrder, PaymentEntity, RazorpayOrder, RazorpayPayment, WebhookEvent, WebhookPayload};
pub use error::RazorpayApiError;
pub use helpers::{checkout_signature, verify_checkout_signature, verify_webhook_signature, webhook_signature};
