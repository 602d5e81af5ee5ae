//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SOUQ_API_BASE_URL` - Base URL of the commerce API (e.g., <https://api.souq.example>)
//!
//! ## Optional
//! - `SOUQ_REQUEST_TIMEOUT_SECS` - Bounded wait for every remote call (default: 10)
//! - `SOUQ_SHIPPING_FEE` - Flat shipping fee applied to non-empty carts (default: 60.00)
//! - `SOUQ_STATE_DIR` - Directory for durable client state (default: .souq)
//! - `SOUQ_API_TOKEN` - Pre-issued bearer credential seeded into the session
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use souq_core::Price;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: &str = "10";
const DEFAULT_SHIPPING_FEE: &str = "60.00";
const DEFAULT_STATE_DIR: &str = ".souq";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Base URL every endpoint path is joined onto
    pub api_base_url: Url,
    /// Bounded wait applied to every fetch, mutation and order call
    pub request_timeout: Duration,
    /// Flat shipping fee for non-empty carts
    pub shipping_fee: Price,
    /// Directory holding the durable credential and checkout draft
    pub state_dir: PathBuf,
    /// Optional pre-issued bearer credential
    pub api_token: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("shipping_fee", &self.shipping_fee)
            .field("state_dir", &self.state_dir)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl StorefrontConfig {
    /// Create a configuration with defaults for everything except the API URL.
    #[must_use]
    pub fn new(mut api_base_url: Url) -> Self {
        ensure_trailing_slash(&mut api_base_url);
        Self {
            api_base_url,
            request_timeout: Duration::from_secs(10),
            shipping_fee: Price::from_minor(6000),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            api_token: None,
            sentry_dsn: None,
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the shipping fee.
    #[must_use]
    pub fn with_shipping_fee(mut self, fee: Price) -> Self {
        self.shipping_fee = fee;
        self
    }

    /// Override the durable state directory.
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = parse_base_url(&get_required(&lookup, "SOUQ_API_BASE_URL")?)?;

        let timeout_secs: u64 = parse_value(
            "SOUQ_REQUEST_TIMEOUT_SECS",
            &get_or_default(&lookup, "SOUQ_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SOUQ_REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let shipping_fee: Decimal = parse_value(
            "SOUQ_SHIPPING_FEE",
            &get_or_default(&lookup, "SOUQ_SHIPPING_FEE", DEFAULT_SHIPPING_FEE),
        )?;
        if shipping_fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "SOUQ_SHIPPING_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let state_dir = PathBuf::from(get_or_default(&lookup, "SOUQ_STATE_DIR", DEFAULT_STATE_DIR));
        let api_token = get_optional(&lookup, "SOUQ_API_TOKEN").map(SecretString::from);
        let sentry_dsn = get_optional(&lookup, "SENTRY_DSN");

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            shipping_fee: Price::new(shipping_fee),
            state_dir,
            api_token,
            sentry_dsn,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable.
fn get_required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    get_optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional variable, treating blank values as unset.
fn get_optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// Get a variable with a default value.
fn get_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional(lookup, key).unwrap_or_else(|| default.to_string())
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the API base URL, normalising it to end with a slash so relative
/// endpoint paths join underneath it rather than replacing its last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("SOUQ_API_BASE_URL".to_string(), reason);

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    ensure_trailing_slash(&mut url);
    Ok(url)
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
}
