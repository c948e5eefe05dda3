//! Currencies and networks the desk accepts deposits in

use serde::Serialize;

use crate::services::chain_source::is_observable;

struct Listing {
    code: &'static str,
    name: &'static str,
    networks: &'static [&'static str],
}

const LISTINGS: &[Listing] = &[
    Listing { code: "BTC", name: "Bitcoin", networks: &["BTC"] },
    Listing { code: "ETH", name: "Ethereum", networks: &["ETH", "ARB"] },
    Listing { code: "USDT", name: "Tether", networks: &["TRX", "ETH", "BSC", "SOL"] },
    Listing { code: "USDC", name: "USD Coin", networks: &["ETH", "SOL", "BSC"] },
    Listing { code: "SOL", name: "Solana", networks: &["SOL"] },
    Listing { code: "TRX", name: "TRON", networks: &["TRX"] },
    Listing { code: "BNB", name: "BNB", networks: &["BSC"] },
    Listing { code: "DOGE", name: "Dogecoin", networks: &["DOGE"] },
    Listing { code: "ADA", name: "Cardano", networks: &["ADA"] },
    Listing { code: "XRP", name: "XRP", networks: &["XRP"] },
    Listing { code: "LTC", name: "Litecoin", networks: &["LTC"] },
    Listing { code: "TON", name: "TON", networks: &["TON"] },
    Listing { code: "DAI", name: "Dai", networks: &["ETH"] },
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub network: &'static str,
    /// Deposits on this network are detected by polling a block explorer
    pub chain_monitoring: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub networks: Vec<NetworkInfo>,
}

pub fn supported_currencies() -> Vec<CurrencyInfo> {
    LISTINGS
        .iter()
        .map(|listing| CurrencyInfo {
            code: listing.code,
            name: listing.name,
            networks: listing
                .networks
                .iter()
                .map(|&network| NetworkInfo {
                    network,
                    chain_monitoring: is_observable(listing.code, network),
                })
                .collect(),
        })
        .collect()
}
