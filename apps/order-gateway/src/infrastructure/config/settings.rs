//! Gateway Configuration Settings
//!
//! Configuration types for the order gateway, loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::infrastructure::broker::AlpacaConfig;
use crate::infrastructure::broker::alpaca::PAPER_TRADING_URL;

/// Alpaca API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Brokerage credentials.
    pub credentials: Credentials,
    /// Brokerage trading API base URL.
    pub base_url: String,
    /// Ledger database file.
    pub db_path: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Upper bound on a single brokerage call.
    pub broker_timeout: Duration,
}

impl GatewayConfig {
    /// Default ledger file.
    pub const DEFAULT_DB_PATH: &'static str = "./trading_desk.db";
    /// Default HTTP port.
    pub const DEFAULT_PORT: u16 = 8080;
    /// Default brokerage call bound.
    pub const DEFAULT_BROKER_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from any key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are missing or empty, or if `PORT`
    /// or `BROKER_TIMEOUT_SECS` is set but unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyValue(key.to_string()));
            }
            Ok(value)
        };
        let api_key = required("APCA_API_KEY_ID")?;
        let api_secret = required("APCA_API_SECRET_KEY")?;

        let base_url = lookup("APCA_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| PAPER_TRADING_URL.to_string());

        let db_path = lookup("DB_PATH")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(Self::DEFAULT_DB_PATH), PathBuf::from);

        let port = parse_or(&lookup, "PORT", Self::DEFAULT_PORT)?;

        let secs = parse_or(&lookup, "BROKER_TIMEOUT_SECS", Self::DEFAULT_BROKER_TIMEOUT.as_secs())?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                key: "BROKER_TIMEOUT_SECS".to_string(),
                value: secs.to_string(),
            });
        }
        let broker_timeout = Duration::from_secs(secs);

        Ok(Self {
            credentials: Credentials::new(api_key, api_secret),
            base_url,
            db_path,
            port,
            broker_timeout,
        })
    }

    /// Adapter configuration for these settings.
    ///
    /// The HTTP client timeout matches the gateway's own bound.
    #[must_use]
    pub fn alpaca_config(&self) -> AlpacaConfig {
        AlpacaConfig::new(
            self.credentials.api_key().to_string(),
            self.credentials.api_secret().to_string(),
        )
        .with_base_url(self.base_url.clone())
        .with_timeout(self.broker_timeout)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is set but cannot be parsed.
    #[error("invalid value for {key}: '{value}'")]
    Invalid {
        /// Environment variable.
        key: String,
        /// Offending value.
        value: String,
    },
}

/// Parses `key` when set and non-blank, otherwise returns `default`.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(raw) if !raw.is_empty() => raw.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        _ => Ok(default),
    }
}
