//! Alpaca broker adapter implementing `BrokerPort`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::ports::{AccountSnapshot, BrokerError, BrokerPort, Placement};
use crate::domain::OrderTicket;

use super::api_types::{AlpacaAccountResponse, AlpacaOrderRequest, AlpacaOrderResponse};
use super::config::AlpacaConfig;
use super::error::AlpacaError;
use super::http_client::AlpacaHttpClient;

/// Alpaca Markets broker adapter.
///
/// The only component holding brokerage credentials.
#[derive(Debug, Clone)]
pub struct AlpacaBrokerAdapter {
    client: AlpacaHttpClient,
}

impl AlpacaBrokerAdapter {
    /// Create an adapter and verify the account is reachable.
    ///
    /// # Errors
    ///
    /// Fails when credentials are missing or refused, or the account cannot
    /// be fetched.
    pub async fn connect(config: AlpacaConfig) -> Result<Self, AlpacaError> {
        if !config.is_paper() {
            tracing::warn!(
                base_url = %config.base_url,
                "Alpaca adapter is not using the paper endpoint"
            );
        }

        let adapter = Self {
            client: AlpacaHttpClient::new(&config)?,
        };
        let account = adapter.fetch_account().await?;
        tracing::info!(
            account_id = %account.account_id,
            status = %account.status,
            buying_power = %account.buying_power,
            "Alpaca account verified"
        );
        Ok(adapter)
    }

    async fn fetch_account(&self) -> Result<AccountSnapshot, AlpacaError> {
        let account: AlpacaAccountResponse = self.client.get("/v2/account").await?;
        AccountSnapshot::try_from(account)
    }

    /// Checks that must hold before anything is sent.
    fn check_ticket(ticket: &OrderTicket) -> Result<(), AlpacaError> {
        if ticket.symbol.trim().is_empty() {
            return Err(AlpacaError::InvalidOrder("symbol is required".to_string()));
        }
        if ticket.qty <= Decimal::ZERO {
            return Err(AlpacaError::InvalidOrder(format!(
                "qty must be positive, got {}",
                ticket.qty
            )));
        }
        for (field, price) in [
            ("limit_price", ticket.kind.limit_price()),
            ("stop_price", ticket.kind.stop_price()),
        ] {
            if let Some(price) = price
                && price <= Decimal::ZERO
            {
                return Err(AlpacaError::InvalidOrder(format!(
                    "{field} must be positive, got {price}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerPort for AlpacaBrokerAdapter {
    async fn place_order(&self, ticket: &OrderTicket) -> Result<Placement, BrokerError> {
        Self::check_ticket(ticket)?;

        let request = AlpacaOrderRequest::from(ticket);
        tracing::info!(
            symbol = %request.symbol,
            side = %request.side,
            order_type = %request.order_type,
            qty = %request.qty,
            limit_price = ?request.limit_price,
            stop_price = ?request.stop_price,
            "Submitting order to Alpaca"
        );

        let response: AlpacaOrderResponse = self.client.post("/v2/orders", &request).await?;

        tracing::info!(
            broker_order_id = %response.id,
            symbol = %response.symbol,
            status = %response.status,
            "Order accepted by Alpaca"
        );

        Ok(response.into_placement())
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        Ok(self.fetch_account().await?)
    }
}
