//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LARKSPUR_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `LARKSPUR_BASE_URL` - Public URL for the storefront
//! - `LARKSPUR_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `LARKSPUR_ADMIN_TOKEN` - Bearer token for the admin API (min 20 chars, high entropy)
//! - `PAYMENT_SECRET_KEY` - Payment gateway secret API key
//!
//! ## Optional
//! - `LARKSPUR_HOST` - Bind address (default: 127.0.0.1)
//! - `LARKSPUR_PORT` - Listen port (default: 3000)
//! - `PAYMENT_API_BASE` - Payment gateway base URL (default: <https://api.stripe.com>)
//! - `STORE_CURRENCY` - ISO 4217 settlement currency (default: USD)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use larkspur_core::CurrencyCode;

/// Substrings that mark a value copied from a template rather than generated.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL; `https://` turns on secure cookies
    pub base_url: String,
    pub session_secret: SecretString,
    /// Bearer token required on `/admin/api`
    pub admin_token: SecretString,
    pub payment: PaymentConfig,
    /// Currency every price and charge is in
    pub currency: CurrencyCode,
    pub sentry: SentryConfig,
}

/// Payment gateway configuration.
#[derive(Clone)]
pub struct PaymentConfig {
    pub api_base: String,
    pub secret_key: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

/// Minimum requirements for a generated secret.
#[derive(Debug, Clone, Copy)]
struct SecretPolicy {
    min_len: usize,
    min_bits_per_char: f64,
}

const SESSION_SECRET_POLICY: SecretPolicy = SecretPolicy {
    min_len: 32,
    min_bits_per_char: 3.3,
};

const ADMIN_TOKEN_POLICY: SecretPolicy = SecretPolicy {
    min_len: 20,
    min_bits_per_char: 3.3,
};

/// API keys are issued by the gateway; only placeholders are rejected.
const API_KEY_POLICY: SecretPolicy = SecretPolicy {
    min_len: 1,
    min_bits_per_char: 0.0,
};

impl SecretPolicy {
    fn check(self, name: &str, value: &str) -> Result<(), ConfigError> {
        let insecure = |reason: String| ConfigError::InsecureSecret(name.to_owned(), reason);

        let lower = value.to_lowercase();
        if let Some(marker) = PLACEHOLDER_MARKERS.iter().find(|m| lower.contains(*m)) {
            return Err(insecure(format!(
                "appears to be a placeholder (contains '{marker}')"
            )));
        }

        let len = value.chars().count();
        if len < self.min_len {
            return Err(insecure(format!(
                "must be at least {} characters (got {len})",
                self.min_len
            )));
        }

        let bits = bits_per_char(value);
        if bits < self.min_bits_per_char {
            return Err(insecure(format!(
                "entropy too low ({bits:.2} bits/char, need >= {:.1}). Use a randomly generated value.",
                self.min_bits_per_char
            )));
        }
        Ok(())
    }
}

/// Shannon entropy of `s` in bits per character.
fn bits_per_char(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0_u32;
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

/// Variable lookup over any source, so loading can be tested without
/// touching the process environment.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .as_deref()
            .unwrap_or(default)
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
    }

    fn secret(&self, key: &str, policy: SecretPolicy) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        policy.check(key, &value)?;
        Ok(SecretString::from(value))
    }
}

impl StorefrontConfig {
    /// Load configuration from the process environment (and `.env` if present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, length, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);

        let database_url = vars
            .optional("LARKSPUR_DATABASE_URL")
            .or_else(|| vars.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("LARKSPUR_DATABASE_URL".to_owned()))?;

        let base_url = vars.required("LARKSPUR_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("LARKSPUR_BASE_URL".to_owned(), e.to_string())
        })?;

        Ok(Self {
            database_url,
            host: vars.parsed("LARKSPUR_HOST", "127.0.0.1")?,
            port: vars.parsed("LARKSPUR_PORT", "3000")?,
            base_url,
            session_secret: vars.secret("LARKSPUR_SESSION_SECRET", SESSION_SECRET_POLICY)?,
            admin_token: vars.secret("LARKSPUR_ADMIN_TOKEN", ADMIN_TOKEN_POLICY)?,
            payment: PaymentConfig {
                api_base: vars
                    .optional("PAYMENT_API_BASE")
                    .unwrap_or_else(|| "https://api.stripe.com".to_owned()),
                secret_key: vars.secret("PAYMENT_SECRET_KEY", API_KEY_POLICY)?,
            },
            currency: vars.parsed("STORE_CURRENCY", "USD")?,
            sentry: SentryConfig {
                dsn: vars.optional("SENTRY_DSN"),
                environment: vars.optional("SENTRY_ENVIRONMENT"),
                sample_rate: vars.parsed("SENTRY_SAMPLE_RATE", "1.0")?,
                traces_sample_rate: vars.parsed("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
            },
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should be marked `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}
