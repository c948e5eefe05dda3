//! Environment-driven configuration
//!
//! Every key has a default except `DATABASE_URL`. Values are read once at
//! startup (after `dotenvy::dotenv()`); malformed values fail startup.

use std::ops::RangeInclusive;
use std::time::Duration;

const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_BIND_ADDR: &str = "BIND_ADDR";
const ENV_AUTO_APPROVE: &str = "AUTO_APPROVE_DEPOSITS";
const ENV_DETECTOR: &str = "DEPOSIT_DETECTOR";
const ENV_SIM_DETECTION_DELAY: &str = "SIMULATED_DETECTION_DELAY_MS";
const ENV_SIM_PROCESSING_DELAY: &str = "SIMULATED_PROCESSING_DELAY_MS";
const ENV_POLL_INTERVAL: &str = "CHAIN_POLL_INTERVAL_SECS";
const ENV_MIN_CONFIRMATIONS: &str = "MIN_CONFIRMATIONS";
const ENV_BLOCKSTREAM_URL: &str = "BLOCKSTREAM_API_URL";
const ENV_ETHERSCAN_URL: &str = "ETHERSCAN_API_URL";
const ENV_ETHERSCAN_KEY: &str = "ETHERSCAN_API_KEY";
const ENV_OBIEX_KEY: &str = "OBIEX_API_KEY";
const ENV_OBIEX_SECRET: &str = "OBIEX_API_SECRET";
const ENV_OBIEX_SANDBOX: &str = "OBIEX_SANDBOX_MODE";
const ENV_OBIEX_BASE_URL: &str = "OBIEX_BASE_URL";
const ENV_GATEWAY_TIMEOUT: &str = "GATEWAY_TIMEOUT_SECS";
const ENV_ADMIN_KEY: &str = "ADMIN_API_KEY";
const ENV_WEBHOOK_SECRET: &str = "OBIEX_WEBHOOK_SECRET";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5001";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_MIN_CONFIRMATIONS: u64 = 2;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BLOCKSTREAM_URL: &str = "https://blockstream.info/api";
const DEFAULT_ETHERSCAN_URL: &str = "https://api.etherscan.io/api";
const OBIEX_LIVE_URL: &str = "https://api.obiex.finance/v1";
const OBIEX_SANDBOX_URL: &str = "https://staging.api.obiex.finance/v1";

/// Which deposit detector arms approved intents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    /// Chain Observer polling public explorers
    Chain,
    /// Randomized timers, never touches a chain
    Simulated,
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chain" => Ok(DetectorKind::Chain),
            "simulated" => Ok(DetectorKind::Simulated),
            _ => Err(format!("Unknown deposit detector: {}", s)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub sandbox: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    pub blockstream_url: String,
    pub etherscan_url: String,
    pub etherscan_api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub auto_approve: bool,
    pub detector: DetectorKind,
    pub simulated_detection_delay: RangeInclusive<Duration>,
    pub simulated_processing_delay: RangeInclusive<Duration>,
    pub poll_interval: Duration,
    pub min_confirmations: u64,
    pub explorers: ExplorerConfig,
    pub gateway: GatewayConfig,
    pub admin_api_key: Option<String>,
    pub webhook_secret: Option<String>,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get(ENV_DATABASE_URL).ok_or(ConfigError::Missing(ENV_DATABASE_URL))?;
        let auto_approve = parse_bool(ENV_AUTO_APPROVE, get(ENV_AUTO_APPROVE), false)?;

        let detector = match get(ENV_DETECTOR) {
            Some(raw) => raw.parse().map_err(|message| ConfigError::Invalid {
                key: ENV_DETECTOR,
                message,
            })?,
            None if auto_approve => DetectorKind::Simulated,
            None => DetectorKind::Chain,
        };

        let min_confirmations =
            parse_u64(ENV_MIN_CONFIRMATIONS, get(ENV_MIN_CONFIRMATIONS), DEFAULT_MIN_CONFIRMATIONS)?;
        if min_confirmations == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_MIN_CONFIRMATIONS,
                message: "must be at least 1".to_string(),
            });
        }

        let poll_interval_secs =
            parse_u64(ENV_POLL_INTERVAL, get(ENV_POLL_INTERVAL), DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_POLL_INTERVAL,
                message: "must be at least 1 second".to_string(),
            });
        }

        let gateway_timeout_secs = parse_u64(
            ENV_GATEWAY_TIMEOUT,
            get(ENV_GATEWAY_TIMEOUT),
            DEFAULT_GATEWAY_TIMEOUT_SECS,
        )?;
        // A zero timeout fails every gateway call
        if gateway_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_GATEWAY_TIMEOUT,
                message: "must be at least 1 second".to_string(),
            });
        }

        let sandbox = parse_bool(ENV_OBIEX_SANDBOX, get(ENV_OBIEX_SANDBOX), false)?;
        let gateway = GatewayConfig {
            base_url: get(ENV_OBIEX_BASE_URL).unwrap_or_else(|| {
                let url = if sandbox { OBIEX_SANDBOX_URL } else { OBIEX_LIVE_URL };
                url.to_string()
            }),
            api_key: get(ENV_OBIEX_KEY),
            api_secret: get(ENV_OBIEX_SECRET),
            sandbox,
            timeout: Duration::from_secs(gateway_timeout_secs),
        };

        Ok(Self {
            database_url,
            bind_addr: get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            auto_approve,
            detector,
            simulated_detection_delay: parse_ms_range(
                ENV_SIM_DETECTION_DELAY,
                get(ENV_SIM_DETECTION_DELAY),
                10_000..=30_000,
            )?,
            simulated_processing_delay: parse_ms_range(
                ENV_SIM_PROCESSING_DELAY,
                get(ENV_SIM_PROCESSING_DELAY),
                2_000..=5_000,
            )?,
            poll_interval: Duration::from_secs(poll_interval_secs),
            min_confirmations,
            explorers: ExplorerConfig {
                blockstream_url: get(ENV_BLOCKSTREAM_URL)
                    .unwrap_or_else(|| DEFAULT_BLOCKSTREAM_URL.to_string()),
                etherscan_url: get(ENV_ETHERSCAN_URL)
                    .unwrap_or_else(|| DEFAULT_ETHERSCAN_URL.to_string()),
                etherscan_api_key: get(ENV_ETHERSCAN_KEY).unwrap_or_default(),
            },
            gateway,
            admin_api_key: get(ENV_ADMIN_KEY),
            webhook_secret: get(ENV_WEBHOOK_SECRET),
        })
    }
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn parse_u64(key: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key,
            message: format!("expected an unsigned integer, got '{}'", value),
        }),
    }
}

/// Parses `"min-max"` (or a single value) in milliseconds
fn parse_ms_range(
    key: &'static str,
    raw: Option<String>,
    default: RangeInclusive<u64>,
) -> Result<RangeInclusive<Duration>, ConfigError> {
    let (min, max) = match raw {
        None => (*default.start(), *default.end()),
        Some(value) => {
            let invalid = || ConfigError::Invalid {
                key,
                message: format!("expected 'min-max' milliseconds, got '{}'", value),
            };
            let (lo, hi) = value.split_once('-').unwrap_or((value.as_str(), value.as_str()));
            let lo: u64 = lo.trim().parse().map_err(|_| invalid())?;
            let hi: u64 = hi.trim().parse().map_err(|_| invalid())?;
            if lo > hi {
                return Err(invalid());
            }
            (lo, hi)
        }
    };
    Ok(Duration::from_millis(min)..=Duration::from_millis(max))
}
