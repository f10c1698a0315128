mod helpers;
mod mocks;

mod notifications;
mod orders;
mod payments;
#[cfg(feature = "razorpay")]
mod webhooks;
