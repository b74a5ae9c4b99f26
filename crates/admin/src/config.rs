//! Back-office configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BACKOFFICE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BACKOFFICE_BASE_URL` - Public URL of the back office (also the passkey relying party)
//!
//! ## Optional
//! - `BACKOFFICE_HOST` - Bind address (default: 127.0.0.1)
//! - `BACKOFFICE_PORT` - Listen port (default: 3001)
//! - `BACKOFFICE_GUARD_TIMEOUT_MS` - Profile lookup bound for the access guard (default: 3000)
//! - `BACKOFFICE_CURRENCY` - Reporting currency (default: USD)
//! - `BACKOFFICE_LOG_FORMAT` - `json` for JSON logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)
//!
//! ## Optional (push notifications)
//! - `PUSH_ENDPOINT_URL` - Messaging provider send endpoint
//! - `PUSH_SERVER_KEY` - Bearer key for the provider (high entropy)
//!
//! ## Optional (TLS)
//! - `BACKOFFICE_TLS_CERT` - PEM-encoded certificate chain
//! - `BACKOFFICE_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use backoffice_core::CurrencyCode;

use crate::services::guard::DEFAULT_LOOKUP_TIMEOUT;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Back-office application configuration.
#[derive(Debug, Clone)]
pub struct BackOfficeConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the back office
    pub base_url: Url,
    /// Upper bound on the guard's profile lookup
    pub guard_timeout: Duration,
    /// Currency reports are expressed in
    pub currency: CurrencyCode,
    /// Log output format
    pub log_format: LogFormat,
    /// Push notification provider (optional)
    pub push: Option<PushConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Push notification provider configuration.
///
/// Implements `Debug` manually to redact the server key.
#[derive(Clone)]
pub struct PushConfig {
    /// Provider send endpoint
    pub endpoint: Url,
    /// Bearer key sent with every message
    pub server_key: SecretString,
}

impl std::fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("server_key", &"[REDACTED]")
            .finish()
    }
}

impl PushConfig {
    fn from_env(env: &Env<'_>) -> Result<Option<Self>, ConfigError> {
        match (env.optional("PUSH_ENDPOINT_URL"), env.optional("PUSH_SERVER_KEY")) {
            (Some(endpoint), Some(key)) => {
                let endpoint = parse_url("PUSH_ENDPOINT_URL", &endpoint)?;
                validate_secret_strength(&key, "PUSH_SERVER_KEY")?;
                Ok(Some(Self {
                    endpoint,
                    server_key: SecretString::from(key),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "PUSH_*".to_string(),
                "Both PUSH_ENDPOINT_URL and PUSH_SERVER_KEY must be set together".to_string(),
            )),
        }
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env(env: &Env<'_>) -> Result<Option<Self>, ConfigError> {
        let cert_pem = env.optional("BACKOFFICE_TLS_CERT");
        let key_pem = env.optional("BACKOFFICE_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "BACKOFFICE_TLS_*".to_string(),
                "Both BACKOFFICE_TLS_CERT and BACKOFFICE_TLS_KEY must be set together"
                    .to_string(),
            )),
        }
    }
}

impl BackOfficeConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::load(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` under the same conditions as [`Self::from_env`].
    pub fn load(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let database_url = env.database_url("BACKOFFICE_DATABASE_URL")?;
        let host = env.parsed("BACKOFFICE_HOST", "127.0.0.1")?;
        let port = env.parsed("BACKOFFICE_PORT", "3001")?;
        let base_url = parse_url("BACKOFFICE_BASE_URL", &env.required("BACKOFFICE_BASE_URL")?)?;
        if base_url.host_str().is_none() {
            return Err(ConfigError::InvalidEnvVar(
                "BACKOFFICE_BASE_URL".to_string(),
                "must have a host".to_string(),
            ));
        }

        let default_timeout = DEFAULT_LOOKUP_TIMEOUT.as_millis().to_string();
        let guard_timeout_ms: u64 = env.parsed("BACKOFFICE_GUARD_TIMEOUT_MS", &default_timeout)?;
        if guard_timeout_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "BACKOFFICE_GUARD_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let currency = env.parsed("BACKOFFICE_CURRENCY", "USD")?;
        let log_format = match env.optional("BACKOFFICE_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let push = PushConfig::from_env(&env)?;
        let sentry_dsn = env.optional("SENTRY_DSN");
        let sentry_environment = env.optional("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = env
            .optional("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = env
            .optional("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let tls = TlsConfig::from_env(&env)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            guard_timeout: Duration::from_millis(guard_timeout_ms),
            currency,
            log_format,
            push,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns a reference to the push configuration, if available.
    ///
    /// Returns `None` if the push variables are not set, which disables
    /// notification forwarding.
    #[must_use]
    pub const fn push(&self) -> Option<&PushConfig> {
        self.push.as_ref()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source used while loading.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get a required environment variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        (self.0)(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional environment variable.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    /// Get an environment variable with a default value, parsed.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .unwrap_or_else(|| default.to_string())
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
