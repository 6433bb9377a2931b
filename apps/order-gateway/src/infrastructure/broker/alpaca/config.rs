//! Alpaca adapter configuration.

use std::fmt;
use std::time::Duration;

/// Paper trading endpoint used unless overridden.
pub const PAPER_TRADING_URL: &str = "https://paper-api.alpaca.markets";

/// Configuration for the Alpaca broker adapter.
#[derive(Clone)]
pub struct AlpacaConfig {
    /// API key.
    pub api_key: String,
    /// API secret.
    pub api_secret: String,
    /// Trading API base URL, without trailing slash.
    pub base_url: String,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl AlpacaConfig {
    /// Create a paper trading configuration.
    #[must_use]
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            base_url: PAPER_TRADING_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Point the adapter at another trading endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether orders go to the paper trading endpoint.
    #[must_use]
    pub fn is_paper(&self) -> bool {
        self.base_url.contains("paper")
    }
}

impl fmt::Debug for AlpacaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlpacaConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_paper() {
        let config = AlpacaConfig::new("key".to_string(), "secret".to_string());
        assert_eq!(config.base_url, PAPER_TRADING_URL);
        assert!(config.is_paper());
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let config = AlpacaConfig::new("key".to_string(), "secret".to_string())
            .with_base_url("https://api.alpaca.markets/");
        assert_eq!(config.base_url, "https://api.alpaca.markets");
        assert!(!config.is_paper());
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = AlpacaConfig::new("PKTEST123".to_string(), "hunter2".to_string());
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("PKTEST123"));
        assert!(!debug.contains("hunter2"));
    }
}
