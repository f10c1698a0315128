use cp_common::Secret;
use log::*;

pub const DEFAULT_API_URL: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Clone, Default)]
pub struct RazorpayConfig {
    pub api_url: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
}

impl RazorpayConfig {
    pub fn new<S: Into<String>>(key_id: S, key_secret: S) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            key_id: key_id.into(),
            key_secret: Secret::new(key_secret.into()),
            webhook_secret: Secret::default(),
        }
    }

    pub fn with_webhook_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.webhook_secret = Secret::new(secret.into());
        self
    }

    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("CP_RAZORPAY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let key_id = std::env::var("CP_RAZORPAY_KEY_ID").unwrap_or_else(|_| {
            warn!("🪛️ CP_RAZORPAY_KEY_ID not set, using (probably useless) default");
            "rzp_test_00000000000000".to_string()
        });
        let key_secret = Secret::new(std::env::var("CP_RAZORPAY_KEY_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ CP_RAZORPAY_KEY_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("CP_RAZORPAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ CP_RAZORPAY_WEBHOOK_SECRET not set. Webhook signatures will not validate.");
            String::default()
        }));
        Self { api_url, key_id, key_secret, webhook_secret }
    }
}
