mod order_number;
mod payment_signature;
mod pricing;

pub use order_number::{is_valid_order_number, new_order_number, ORDER_NUMBER_PREFIX};
pub use payment_signature::{calculate_hmac_hex, payment_signature_message, sign_payment, verify_hmac_hex, verify_payment_signature};
pub use pricing::{PricingError, PricingPolicy};
