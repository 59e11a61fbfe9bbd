use std::{env, str::FromStr, time::Duration};

use crate::errors::AppError;

/// Runtime configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub session_key: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub plaid_client_id: String,
    pub plaid_secret: String,
    pub plaid_env: PlaidEnv,
    pub plaid_client_name: String,
    pub plaid_payment_recipient_id: Option<String>,
    pub gcs_bucket_name: String,
    pub gcs_hmac_access_id: String,
    pub gcs_hmac_secret: String,
    pub signup_ttl: Duration,
    pub statement_check_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaidEnv {
    Sandbox,
    Development,
    Production,
}

impl PlaidEnv {
    pub fn base_url(&self) -> &'static str {
        match self {
            PlaidEnv::Sandbox => "https://sandbox.plaid.com",
            PlaidEnv::Development => "https://development.plaid.com",
            PlaidEnv::Production => "https://production.plaid.com",
        }
    }
}

impl FromStr for PlaidEnv {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(PlaidEnv::Sandbox),
            "development" => Ok(PlaidEnv::Development),
            "production" => Ok(PlaidEnv::Production),
            other => Err(AppError::Config(format!("Invalid PLAID_ENV: {}", other))),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so it can be tested without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", key)))
        };
        let or_default = |key: &str, default: &str| {
            lookup(key).unwrap_or_else(|| {
                log::info!("{} not set, using default: {}", key, default);
                default.to_string()
            })
        };
        let parsed = |key: &str, default: &str| {
            or_default(key, default)
                .parse::<u64>()
                .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
        };

        let port = or_default("PORT", "3333")
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid PORT: {}", e)))?;

        let session_key = required("SESSION_KEY")?;
        if session_key.len() < 64 {
            return Err(AppError::Config(
                "SESSION_KEY must be at least 64 bytes long".to_string(),
            ));
        }

        let config = Config {
            host: or_default("HOST", "0.0.0.0"),
            port,
            database_url: or_default("DATABASE_URL", "sqlite://trok.db"),
            redis_url: or_default("REDIS_URL", "redis://127.0.0.1:6379"),
            session_key,
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_api_base: or_default("STRIPE_API_BASE", "https://api.stripe.com"),
            plaid_client_id: required("PLAID_CLIENT_ID")?,
            plaid_secret: required("PLAID_SECRET")?,
            plaid_env: or_default("PLAID_ENV", "sandbox").parse()?,
            plaid_client_name: or_default("PLAID_CLIENT_NAME", "Trok"),
            plaid_payment_recipient_id: lookup("PLAID_PAYMENT_RECIPIENT_ID")
                .filter(|v| !v.is_empty()),
            gcs_bucket_name: required("GCS_BUCKET_NAME")?,
            gcs_hmac_access_id: required("GCS_HMAC_ACCESS_ID")?,
            gcs_hmac_secret: required("GCS_HMAC_SECRET")?,
            signup_ttl: Duration::from_secs(parsed("SIGNUP_TTL_SECS", "172800")?),
            statement_check_interval: Duration::from_secs(parsed(
                "STATEMENT_CHECK_INTERVAL_SECS",
                "3600",
            )?),
        };

        if config.statement_check_interval.is_zero() {
            return Err(AppError::Config(
                "STATEMENT_CHECK_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        log::info!("Configuration loaded");
        Ok(config)
    }
}
