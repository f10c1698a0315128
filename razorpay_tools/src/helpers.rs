use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(secret: &str, data: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(data);
            hex::encode(mac.finalize().into_bytes())
        },
        Err(_) => String::default(),
    }
}

fn verify_hex(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

/// The signature the checkout widget hands back: `hex(HMAC_SHA256(key_secret, "<order_id>|<payment_id>"))`.
pub fn checkout_signature(key_secret: &str, razorpay_order_id: &str, razorpay_payment_id: &str) -> String {
    hmac_hex(key_secret, format!("{razorpay_order_id}|{razorpay_payment_id}").as_bytes())
}

pub fn verify_checkout_signature(
    key_secret: &str,
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    signature: &str,
) -> bool {
    verify_hex(key_secret, format!("{razorpay_order_id}|{razorpay_payment_id}").as_bytes(), signature)
}

/// Webhooks are signed over the raw request body with the webhook secret, not the API key secret.
pub fn webhook_signature(webhook_secret: &str, body: &[u8]) -> String {
    hmac_hex(webhook_secret, body)
}

pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify_hex(webhook_secret, body, signature)
}
