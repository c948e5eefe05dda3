//! Public block explorer lookups used by the chain observer
//!
//! Only two (currency, network) pairs are wired up: BTC on BTC via
//! Blockstream and ETH on ETH via Etherscan. Every other pair reports
//! `ChainLookup::Unsupported` rather than an error.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ExplorerConfig;

const EXPLORER_TIMEOUT: Duration = Duration::from_secs(20);
const SATS_SCALE: u32 = 8;
const WEI_SCALE: u32 = 18;

#[derive(Debug, thiserror::Error)]
pub enum ChainSourceError {
    #[error("Explorer request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Explorer error: {0}")]
    Api(String),
    #[error("Unexpected explorer response: {0}")]
    Decode(String),
}

/// A transaction paying the watched address
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTransaction {
    pub txid: String,
    pub confirmations: u64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainLookup {
    Found(Vec<ChainTransaction>),
    /// No explorer is wired up for this (currency, network) pair
    Unsupported,
}

#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// List transactions paying `address`
    async fn transactions_to(
        &self,
        currency: &str,
        network: &str,
        address: &str,
    ) -> Result<ChainLookup, ChainSourceError>;
}

fn explorer_client() -> Result<Client, ChainSourceError> {
    Ok(Client::builder().timeout(EXPLORER_TIMEOUT).build()?)
}

// Blockstream API response structures
#[derive(Debug, Deserialize)]
struct BlockstreamTx {
    txid: String,
    status: BlockstreamStatus,
    vout: Vec<BlockstreamOutput>,
}

#[derive(Debug, Deserialize)]
struct BlockstreamStatus {
    #[serde(default)]
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BlockstreamOutput {
    #[serde(default)]
    scriptpubkey_address: Option<String>,
    value: u64,
}

impl BlockstreamTx {
    /// Satoshis paid to `address` across all outputs
    fn received_by(&self, address: &str) -> u64 {
        self.vout
            .iter()
            .filter(|out| out.scriptpubkey_address.as_deref() == Some(address))
            .map(|out| out.value)
            .sum()
    }
}

/// Depth of a transaction mined at `height` given the current tip. Unmined is 0.
fn confirmations_at(tip: u64, height: Option<u64>) -> u64 {
    match height {
        Some(h) if tip >= h => tip - h + 1,
        _ => 0,
    }
}

/// Bitcoin mainnet lookups via the Blockstream Esplora API
#[derive(Clone)]
pub struct BlockstreamExplorer {
    client: Client,
    base_url: String,
}

impl BlockstreamExplorer {
    pub fn new(base_url: &str) -> Result<Self, ChainSourceError> {
        Ok(Self {
            client: explorer_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn tip_height(&self) -> Result<u64, ChainSourceError> {
        let url = format!("{}/blocks/tip/height", self.base_url);
        let body = self.client.get(&url).send().await?.error_for_status()?.text().await?;
        body.trim()
            .parse()
            .map_err(|_| ChainSourceError::Decode(format!("tip height '{}'", body.trim())))
    }

    pub async fn address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<ChainTransaction>, ChainSourceError> {
        let url = format!("{}/address/{}/txs", self.base_url, address);
        let txs: Vec<BlockstreamTx> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| ChainSourceError::Decode(e.to_string()))?;

        let paying: Vec<(BlockstreamTx, u64)> = txs
            .into_iter()
            .filter_map(|tx| {
                let sats = tx.received_by(address);
                (sats > 0).then_some((tx, sats))
            })
            .collect();

        // Tip is only needed once something mined pays the address
        let tip = if paying.iter().any(|(tx, _)| tx.status.block_height.is_some()) {
            self.tip_height().await?
        } else {
            0
        };

        Ok(paying
            .into_iter()
            .map(|(tx, sats)| ChainTransaction {
                confirmations: confirmations_at(tip, tx.status.block_height),
                amount: Decimal::from_i128_with_scale(i128::from(sats), SATS_SCALE).normalize(),
                txid: tx.txid,
            })
            .collect())
    }
}

// Etherscan API response structures
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtherscanTx {
    hash: String,
    #[serde(default)]
    to: String,
    value: String,
    confirmations: String,
    #[serde(default)]
    is_error: Option<String>,
}

fn wei_to_eth(wei: &str) -> Result<Decimal, ChainSourceError> {
    let raw: i128 = wei
        .parse()
        .map_err(|_| ChainSourceError::Decode(format!("wei value '{}'", wei)))?;
    Decimal::try_from_i128_with_scale(raw, WEI_SCALE)
        .map(|d| d.normalize())
        .map_err(|e| ChainSourceError::Decode(e.to_string()))
}

/// Ethereum mainnet lookups via the Etherscan account API
#[derive(Clone)]
pub struct EtherscanExplorer {
    client: Client,
    base_url: String,
    api_key: String,
}

impl EtherscanExplorer {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ChainSourceError> {
        Ok(Self {
            client: explorer_client()?,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub async fn address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<ChainTransaction>, ChainSourceError> {
        let response: EtherscanResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("startblock", "0"),
                ("endblock", "99999999"),
                ("sort", "desc"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| ChainSourceError::Decode(e.to_string()))?;

        if response.status != "1" {
            // Etherscan reports an empty history as status 0
            if response.message.starts_with("No transactions found") {
                return Ok(Vec::new());
            }
            return Err(ChainSourceError::Api(format!(
                "{}: {}",
                response.message, response.result
            )));
        }

        let txs: Vec<EtherscanTx> = serde_json::from_value(response.result)
            .map_err(|e| ChainSourceError::Decode(e.to_string()))?;

        let mut incoming = Vec::new();
        for tx in txs {
            if !tx.to.eq_ignore_ascii_case(address) || tx.is_error.as_deref() == Some("1") {
                continue;
            }
            // Zero-value calls carry no deposit
            let amount = wei_to_eth(&tx.value)?;
            if amount <= Decimal::ZERO {
                continue;
            }
            incoming.push(ChainTransaction {
                confirmations: tx.confirmations.parse().unwrap_or(0),
                amount,
                txid: tx.hash,
            });
        }
        Ok(incoming)
    }
}

/// Whether an explorer is wired up for the (currency, network) pair
pub fn is_observable(currency: &str, network: &str) -> bool {
    explorer_for(currency, network).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Explorer {
    Blockstream,
    Etherscan,
}

fn explorer_for(currency: &str, network: &str) -> Option<Explorer> {
    match (currency.to_uppercase().as_str(), network.to_uppercase().as_str()) {
        ("BTC", "BTC") => Some(Explorer::Blockstream),
        ("ETH", "ETH") => Some(Explorer::Etherscan),
        _ => None,
    }
}

/// Dispatches lookups to the explorer for the (currency, network) pair
#[derive(Clone)]
pub struct ExplorerRegistry {
    blockstream: BlockstreamExplorer,
    etherscan: EtherscanExplorer,
}

impl ExplorerRegistry {
    pub fn new(config: &ExplorerConfig) -> Result<Self, ChainSourceError> {
        Ok(Self {
            blockstream: BlockstreamExplorer::new(&config.blockstream_url)?,
            etherscan: EtherscanExplorer::new(&config.etherscan_url, &config.etherscan_api_key)?,
        })
    }
}

#[async_trait]
impl ChainDataSource for ExplorerRegistry {
    async fn transactions_to(
        &self,
        currency: &str,
        network: &str,
        address: &str,
    ) -> Result<ChainLookup, ChainSourceError> {
        match explorer_for(currency, network) {
            Some(Explorer::Blockstream) => self.blockstream.address_transactions(address).await.map(ChainLookup::Found),
            Some(Explorer::Etherscan) => self.etherscan.address_transactions(address).await.map(ChainLookup::Found),
            None => Ok(ChainLookup::Unsupported),
        }
    }
}
