use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use cp_common::{helpers::parse_boolean_flag, Money, Secret};
use cp_order_engine::{helpers::PricingPolicy, DEFAULT_INTENT_TTL_MINUTES};
use log::*;
use rand::{distributions::Alphanumeric, Rng};

use crate::errors::ServerError;

const DEFAULT_CP_HOST: &str = "127.0.0.1";
const DEFAULT_CP_PORT: u16 = 8480;
const DEFAULT_CP_WS_PORT: u16 = 8481;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/carepoint.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The real-time tracking hub listens on its own port, on the same host.
    pub ws_port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub payments: PaymentConfig,
    pub pricing: PricingPolicy,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CP_HOST.to_string(),
            port: DEFAULT_CP_PORT,
            ws_port: DEFAULT_CP_WS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            payments: PaymentConfig::default(),
            pricing: PricingPolicy::default(),
            use_x_forwarded_for: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CP_HOST").ok().unwrap_or_else(|| DEFAULT_CP_HOST.into());
        let port = parse_env("CP_PORT", DEFAULT_CP_PORT);
        let ws_port = parse_env("CP_WS_PORT", DEFAULT_CP_WS_PORT);
        let database_url = env::var("CP_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ CP_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration. {e}. Reverting to the default configuration.");
            AuthConfig::default()
        });
        let payments = PaymentConfig::from_env_or_default();
        let pricing = pricing_from_env();
        let use_x_forwarded_for = parse_boolean_flag(env::var("CP_USE_X_FORWARDED_FOR").ok(), false);
        Self { host, port, ws_port, database_url, auth, payments, pricing, use_x_forwarded_for }
    }
}

fn parse_env<T: FromStr + Display + Copy>(name: &str, default: T) -> T
where T::Err: Display {
    match env::var(name) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

fn pricing_from_env() -> PricingPolicy {
    let defaults = PricingPolicy::default();
    let threshold = env::var("CP_FREE_DELIVERY_THRESHOLD")
        .ok()
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid value for CP_FREE_DELIVERY_THRESHOLD. {e}")).ok()
        })
        .map(Money::from_rupees)
        .unwrap_or(defaults.free_delivery_threshold);
    let delivery_fee = env::var("CP_DELIVERY_FEE")
        .ok()
        .and_then(|s| s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid value for CP_DELIVERY_FEE. {e}")).ok())
        .map(Money::from_rupees)
        .unwrap_or(defaults.delivery_fee);
    let tax_rate_bps = parse_env("CP_TAX_RATE_BPS", defaults.tax_rate_bps);
    info!("🪛️ Delivery is free from {threshold}, otherwise {delivery_fee}. Tax rate: {tax_rate_bps} bps.");
    PricingPolicy { free_delivery_threshold: threshold, delivery_fee, tax_rate_bps }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret used to validate (and, for tooling, issue) access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. Tokens issued \
             elsewhere will not validate. DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let secret: String = rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("CP_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [CP_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError("CP_JWT_SECRET must be at least 32 characters long".into()));
        }
        Ok(Self::new(secret))
    }
}

//-------------------------------------------------  PaymentConfig  ----------------------------------------------------
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    Mock,
    Razorpay,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" | "local" => Ok(Self::Mock),
            "razorpay" => Ok(Self::Razorpay),
            _ => Err(format!("Unknown payment provider: {s}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub provider: ProviderKind,
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    /// If false, the webhook endpoint accepts unsigned calls. Only ever disable this for local testing.
    pub webhook_checks: bool,
    pub intent_ttl: Duration,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            key_id: "mock_key".to_string(),
            key_secret: Secret::new("mock_secret".to_string()),
            webhook_secret: Secret::default(),
            webhook_checks: true,
            intent_ttl: Duration::minutes(DEFAULT_INTENT_TTL_MINUTES),
        }
    }
}

impl PaymentConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let provider = env::var("CP_PAYMENT_PROVIDER")
            .ok()
            .and_then(|s| s.parse::<ProviderKind>().map_err(|e| warn!("🪛️ {e}. Using the mock provider.")).ok())
            .unwrap_or_default();
        if provider == ProviderKind::Mock {
            warn!("🪛️ Using the mock payment provider. Payments are simulated and no money moves.");
        }
        let key_id = env::var("CP_RAZORPAY_KEY_ID").ok().unwrap_or(defaults.key_id);
        let key_secret = env::var("CP_RAZORPAY_KEY_SECRET").ok().map(Secret::new).unwrap_or(defaults.key_secret);
        let webhook_secret = env::var("CP_RAZORPAY_WEBHOOK_SECRET").ok().map(Secret::new).unwrap_or_else(|| {
            warn!("🪛️ CP_RAZORPAY_WEBHOOK_SECRET is not set. Signed webhook calls will be rejected.");
            Secret::default()
        });
        let webhook_checks = parse_boolean_flag(env::var("CP_RAZORPAY_WEBHOOK_CHECKS").ok(), true);
        if !webhook_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Anyone can mark orders as paid.");
        }
        let intent_ttl = Duration::minutes(parse_env("CP_PAYMENT_INTENT_TTL", DEFAULT_INTENT_TTL_MINUTES));
        Self { provider, key_id, key_secret, webhook_secret, webhook_checks, intent_ttl }
    }
}
