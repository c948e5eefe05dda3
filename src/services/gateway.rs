//! Exchange gateway contract and the Obiex HTTP client
//!
//! The gateway is an opaque remote service. Every call is bounded by the
//! client timeout and is never retried here; callers decide what a failure
//! means for the intent.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;

use crate::config::GatewayConfig;
use crate::models::gateway::{DepositAddress, Quote, TradeExecution, TradeSide, Withdrawal};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No API credentials configured
    #[error("Exchange gateway credentials are not configured")]
    NotConfigured,
    #[error("Exchange gateway secret is unusable")]
    InvalidCredentials,
    #[error("Exchange gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status from the exchange
    #[error("Exchange gateway returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected exchange gateway response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Live,
    Sandbox,
    Unconfigured,
}

/// One side of a conversion: `amount` of `source` into `target`
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub source: String,
    pub target: String,
    pub side: TradeSide,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalOrder {
    pub currency: String,
    pub network: String,
    pub amount: Decimal,
    pub address: String,
    pub memo: Option<String>,
}

#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    fn mode(&self) -> GatewayMode;

    async fn create_quote(&self, order: &TradeOrder) -> Result<Quote, GatewayError>;

    /// Execute a trade, accepting `quote_id` when given, otherwise quoting first
    async fn trade(
        &self,
        order: &TradeOrder,
        quote_id: Option<&str>,
    ) -> Result<TradeExecution, GatewayError>;

    async fn get_deposit_address(
        &self,
        currency: &str,
        network: &str,
        identifier: &str,
    ) -> Result<DepositAddress, GatewayError>;

    async fn withdraw_crypto(&self, order: &WithdrawalOrder) -> Result<Withdrawal, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTrade {
    id: String,
    #[serde(default)]
    status: Option<String>,
    amount_received: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireWithdrawal {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    fee: Option<Decimal>,
}

#[derive(Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
}

/// Signed HTTP client for the Obiex v1 API
#[derive(Clone)]
pub struct ObiexClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    sandbox: bool,
}

impl ObiexClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let credentials = match (&config.api_key, &config.api_secret) {
            (Some(api_key), Some(api_secret)) => Some(Credentials {
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
            }),
            _ => None,
        };

        if credentials.is_none() {
            tracing::warn!("Obiex credentials missing; gateway calls will fail and addresses fall back to local generation");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            sandbox: config.sandbox,
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let credentials = self.credentials.as_ref().ok_or(GatewayError::NotConfigured)?;

        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let signature = sign_request(&credentials.api_secret, method.as_str(), path, &timestamp)?;
        let url = format!("{}/{}", self.base_url, path);

        tracing::debug!(method = %method, path = %path, "Obiex request");

        let response = self
            .client
            .request(method, &url)
            .header("x-api-key", &credentials.api_key)
            .header("x-api-timestamp", &timestamp)
            .header("x-api-signature", signature)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }

        serde_json::from_slice::<Envelope<T>>(&bytes)
            .map(|envelope| envelope.data)
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn accept_quote(&self, quote_id: &str) -> Result<TradeExecution, GatewayError> {
        let trade: WireTrade = self
            .send(Method::POST, &format!("trades/quote/{}", quote_id), json!({}))
            .await?;

        Ok(TradeExecution {
            transaction_id: trade.id.clone(),
            id: trade.id,
            status: trade.status.unwrap_or_else(|| "COMPLETED".to_string()),
            amount_received: trade.amount_received,
        })
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> GatewayError {
    let message = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    GatewayError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Hex HMAC-SHA256 over `METHOD/path` followed by the timestamp
pub fn sign_request(
    secret: &str,
    method: &str,
    path: &str,
    timestamp: &str,
) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GatewayError::InvalidCredentials)?;
    mac.update(method.to_uppercase().as_bytes());
    mac.update(b"/");
    mac.update(path.trim_start_matches('/').as_bytes());
    mac.update(timestamp.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl ExchangeGateway for ObiexClient {
    fn mode(&self) -> GatewayMode {
        match (&self.credentials, self.sandbox) {
            (None, _) => GatewayMode::Unconfigured,
            (Some(_), true) => GatewayMode::Sandbox,
            (Some(_), false) => GatewayMode::Live,
        }
    }

    async fn create_quote(&self, order: &TradeOrder) -> Result<Quote, GatewayError> {
        tracing::info!(
            source = %order.source,
            target = %order.target,
            side = %order.side,
            amount = %order.amount,
            "Creating quote"
        );

        self.send(
            Method::POST,
            "trades/quote",
            json!({
                "source": order.source,
                "target": order.target,
                "side": order.side,
                "amount": order.amount,
            }),
        )
        .await
    }

    async fn trade(
        &self,
        order: &TradeOrder,
        quote_id: Option<&str>,
    ) -> Result<TradeExecution, GatewayError> {
        let quote_id = match quote_id {
            Some(id) => id.to_string(),
            None => self.create_quote(order).await?.id,
        };

        tracing::info!(quote_id = %quote_id, source = %order.source, target = %order.target, "Executing trade");
        self.accept_quote(&quote_id).await
    }

    async fn get_deposit_address(
        &self,
        currency: &str,
        network: &str,
        identifier: &str,
    ) -> Result<DepositAddress, GatewayError> {
        self.send(
            Method::POST,
            "addresses/broker",
            json!({
                "currency": currency,
                "network": network,
                "purpose": identifier,
            }),
        )
        .await
    }

    async fn withdraw_crypto(&self, order: &WithdrawalOrder) -> Result<Withdrawal, GatewayError> {
        tracing::info!(
            currency = %order.currency,
            network = %order.network,
            amount = %order.amount,
            "Submitting withdrawal"
        );

        let wire: WireWithdrawal = self
            .send(
                Method::POST,
                "wallets/ext/debit/crypto",
                json!({
                    "amount": order.amount,
                    "currency": order.currency,
                    "destination": {
                        "address": order.address,
                        "network": order.network,
                        "memo": order.memo,
                    },
                }),
            )
            .await?;

        let transaction_id = wire
            .transaction_id
            .or(wire.id)
            .ok_or_else(|| GatewayError::Decode("withdrawal response carries no id".to_string()))?;

        Ok(Withdrawal {
            transaction_id,
            status: wire.status.unwrap_or_else(|| "PENDING".to_string()),
            fee: wire.fee.unwrap_or_default(),
        })
    }
}
