//! # Checkout signatures
//!
//! When a customer completes checkout, the payment provider hands the client three values: the provider order id, the
//! payment id and a signature. The signature is
//!
//! ```text
//!    hex(HMAC_SHA256(key_secret, "{provider_order_id}|{payment_id}"))
//! ```
//!
//! Only the provider and this server know `key_secret`, so a valid signature proves that the provider saw a successful
//! payment for that provider order. Comparisons are done in constant time via [`Mac::verify_slice`].
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn payment_signature_message(provider_order_id: &str, payment_id: &str) -> String {
    format!("{provider_order_id}|{payment_id}")
}

/// Hex-encoded HMAC-SHA256 of `data` using `secret` as the key.
pub fn calculate_hmac_hex(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a hex-encoded HMAC-SHA256 signature in constant time. Malformed hex is simply an invalid signature.
pub fn verify_hmac_hex(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

pub fn sign_payment(secret: &str, provider_order_id: &str, payment_id: &str) -> String {
    calculate_hmac_hex(secret, payment_signature_message(provider_order_id, payment_id).as_bytes())
}

pub fn verify_payment_signature(secret: &str, provider_order_id: &str, payment_id: &str, signature: &str) -> bool {
    let message = payment_signature_message(provider_order_id, payment_id);
    verify_hmac_hex(secret, message.as_bytes(), signature)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_vector() {
        // RFC 4231, test case 2
        let sig = calculate_hmac_hex("Jefe", b"what do ya want for nothing?");
        assert_eq!(sig, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
        assert!(verify_hmac_hex("Jefe", b"what do ya want for nothing?", &sig));
        assert!(verify_hmac_hex("Jefe", b"what do ya want for nothing?", &sig.to_uppercase()));
    }

    #[test]
    fn payment_signatures() {
        let sig = sign_payment("s3cr3t", "order_Nx1", "pay_Qz9");
        assert_eq!(sig.len(), 64);
        assert!(verify_payment_signature("s3cr3t", "order_Nx1", "pay_Qz9", &sig));
        assert!(!verify_payment_signature("s3cr3t", "order_Nx1", "pay_Qz8", &sig));
        assert!(!verify_payment_signature("other", "order_Nx1", "pay_Qz9", &sig));
        assert!(!verify_payment_signature("s3cr3t", "order_Nx1", "pay_Qz9", "not hex"));
        assert!(!verify_payment_signature("s3cr3t", "order_Nx1", "pay_Qz9", ""));
    }
}
