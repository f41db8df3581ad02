//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional:
//! - `DUKA_API_URL` - Commerce API base URL (default: `https://snbl-api.deploy.tz/api/`)
//! - `DUKA_STORAGE_DIR` - Directory for the durable session and cart store (default: `.duka`)
//! - `DUKA_DELIVERY_FEE` - Flat delivery fee for non-empty carts (default: 5.99)
//! - `DUKA_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `DUKA_PRODUCT_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate, 0.0-1.0 (default: 1.0)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "https://snbl-api.deploy.tz/api/";
const DEFAULT_STORAGE_DIR: &str = ".duka";
const DEFAULT_DELIVERY_FEE: &str = "5.99";
const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "30";
const DEFAULT_PRODUCT_CACHE_TTL_SECS: &str = "300";
const DEFAULT_SENTRY_SAMPLE_RATE: &str = "1.0";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Commerce API base URL, always ending in `/` so endpoint paths join onto it
    pub api_base_url: Url,
    /// Directory holding the durable key/value store
    pub storage_dir: PathBuf,
    /// Flat delivery fee charged on any non-empty cart
    pub delivery_fee: Decimal,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Lifetime of cached catalog responses
    pub product_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_base_url = parse_base_url("DUKA_API_URL", &get("DUKA_API_URL", DEFAULT_API_URL))?;
        let storage_dir = PathBuf::from(get("DUKA_STORAGE_DIR", DEFAULT_STORAGE_DIR));

        let delivery_fee: Decimal = parse_var(
            "DUKA_DELIVERY_FEE",
            &get("DUKA_DELIVERY_FEE", DEFAULT_DELIVERY_FEE),
        )?;
        if delivery_fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "DUKA_DELIVERY_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let request_timeout = Duration::from_secs(parse_var(
            "DUKA_REQUEST_TIMEOUT_SECS",
            &get("DUKA_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
        )?);
        let product_cache_ttl = Duration::from_secs(parse_var(
            "DUKA_PRODUCT_CACHE_TTL_SECS",
            &get("DUKA_PRODUCT_CACHE_TTL_SECS", DEFAULT_PRODUCT_CACHE_TTL_SECS),
        )?);

        let sentry_sample_rate: f32 = parse_var(
            "SENTRY_SAMPLE_RATE",
            &get("SENTRY_SAMPLE_RATE", DEFAULT_SENTRY_SAMPLE_RATE),
        )?;
        if !(0.0..=1.0).contains(&sentry_sample_rate) {
            return Err(ConfigError::InvalidEnvVar(
                "SENTRY_SAMPLE_RATE".to_string(),
                "must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            storage_dir,
            delivery_fee,
            request_timeout,
            product_cache_ttl,
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a value, mapping failures to `ConfigError::InvalidEnvVar`.
fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the API base URL, enforcing a trailing slash.
///
/// Without it `Url::join("orders/")` would replace the last path segment
/// (`/api` + `orders/` = `/orders/`) instead of appending to it.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
