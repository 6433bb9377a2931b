//! HTTP client wrapper for the Alpaca trading API.
//!
//! Each call is a single attempt. Failures are classified by status code and
//! handed back to the gateway, which decides what the caller sees.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::api_types::AlpacaErrorResponse;
use super::config::AlpacaConfig;
use super::error::AlpacaError;

/// HTTP client for the Alpaca trading API.
#[derive(Clone)]
pub struct AlpacaHttpClient {
    client: Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl std::fmt::Debug for AlpacaHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlpacaHttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AlpacaHttpClient {
    /// Create a new HTTP client from config.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(AlpacaError::AuthenticationFailed(
                "API key and secret are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AlpacaError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.base_url.clone(),
        })
    }

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AlpacaError> {
        let request = self.client.get(self.url(path));
        self.send(request).await
    }

    /// Make a POST request with a JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AlpacaError> {
        let request = self.client.post(self.url(path)).json(body);
        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AlpacaError> {
        let response = request
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| AlpacaError::JsonParse(e.to_string()));
        }

        let (code, message) = match serde_json::from_str::<AlpacaErrorResponse>(&body) {
            Ok(err) => (
                err.code
                    .map_or_else(|| status.as_u16().to_string(), |c| c.to_string()),
                err.message,
            ),
            Err(_) if body.trim().is_empty() => (
                status.as_u16().to_string(),
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            ),
            Err(_) => (status.as_u16().to_string(), body),
        };

        tracing::debug!(status = status.as_u16(), %code, %message, "Alpaca request failed");

        Err(match categorize_status(status) {
            ErrorCategory::Auth => AlpacaError::AuthenticationFailed(message),
            ErrorCategory::Rejected => AlpacaError::OrderRejected(message),
            ErrorCategory::RateLimited => AlpacaError::RateLimited(message),
            ErrorCategory::Server => AlpacaError::Server {
                status: status.as_u16(),
                message,
            },
            ErrorCategory::Other => AlpacaError::Api { code, message },
        })
    }
}

/// Error category for an unsuccessful status.
#[derive(Debug, PartialEq, Eq)]
enum ErrorCategory {
    Auth,
    Rejected,
    RateLimited,
    Server,
    Other,
}

/// Categorize an HTTP status code.
///
/// Alpaca answers 403 both for bad credentials and for insufficient buying
/// power, so 403 is treated as an order rejection.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        401 => ErrorCategory::Auth,
        400 | 403 | 404 | 422 => ErrorCategory::Rejected,
        429 => ErrorCategory::RateLimited,
        408 | 500..=599 => ErrorCategory::Server,
        _ => ErrorCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_rejections() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::UNPROCESSABLE_ENTITY,
        ] {
            assert_eq!(categorize_status(status), ErrorCategory::Rejected);
        }
        assert_eq!(
            categorize_status(StatusCode::UNAUTHORIZED),
            ErrorCategory::Auth
        );
    }

    #[test]
    fn categorize_transient() {
        assert_eq!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCategory::RateLimited
        );
        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            assert_eq!(categorize_status(status), ErrorCategory::Server);
        }
    }

    #[test]
    fn empty_credentials_are_refused() {
        let config = AlpacaConfig::new(String::new(), "secret".to_string());
        assert!(matches!(
            AlpacaHttpClient::new(&config),
            Err(AlpacaError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn debug_hides_credentials() {
        let config = AlpacaConfig::new("PKKEY".to_string(), "SECRET".to_string());
        let client = AlpacaHttpClient::new(&config).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("PKKEY"));
        assert!(!debug.contains("SECRET"));
    }
}
