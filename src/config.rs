//! Process configuration, read once from the environment at startup.

use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub admin_email: Option<String>,
    pub nats_url: Option<String>,
    pub stripe: StripeConfig,
    pub checkout: CheckoutConfig,
}

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub api_base: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance: Duration,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).with_context(|| format!("{key} must be set"));
        let number = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(raw) => raw.parse().with_context(|| format!("{key} must be a whole number, got {raw:?}")),
                None => Ok(default),
            }
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            None => 8083,
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl: Duration::from_secs(number("JWT_TTL_DAYS", 3)? * 24 * 60 * 60),
            admin_email: get("ADMIN_EMAIL").map(|e| e.trim().to_lowercase()),
            nats_url: get("NATS_URL"),
            stripe: StripeConfig {
                api_base: get("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string()),
                secret_key: required("STRIPE_KEY")?,
                webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
                webhook_tolerance: Duration::from_secs(number("WEBHOOK_TOLERANCE_SECS", 300)?),
                timeout: Duration::from_secs(number("GATEWAY_TIMEOUT_SECS", 15)?),
            },
            checkout: CheckoutConfig {
                currency: get("CHECKOUT_CURRENCY").unwrap_or_else(|| "eur".to_string()).to_lowercase(),
                success_url: get("CHECKOUT_SUCCESS_URL").unwrap_or_else(|| "http://localhost:3000/success".to_string()),
                cancel_url: get("CHECKOUT_CANCEL_URL").unwrap_or_else(|| "http://localhost:3000/cancel".to_string()),
            },
        })
    }
}
