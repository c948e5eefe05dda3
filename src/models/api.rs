//! Request and response bodies for the HTTP surface
//!
//! Request fields are optional at the serde level so that missing fields are
//! reported as `VALIDATION_ERROR` by the lifecycle controller instead of a
//! generic extractor rejection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::deposit_intent::{DepositIntent, DepositTransaction, ExternalStatus, StatusCounts};
use crate::models::gateway::TradeSide;

/// POST /deposit-address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepositAddressRequest {
    pub currency: Option<String>,
    pub network: Option<String>,
    pub user_id: Option<String>,
    pub identifier: Option<String>,
    pub target_currency: Option<String>,
    pub target_network: Option<String>,
}

/// POST /quote
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteRequest {
    pub source: Option<String>,
    pub target: Option<String>,
    pub side: Option<TradeSide>,
    pub amount: Option<Decimal>,
}

/// POST /trade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeRequest {
    pub source: Option<String>,
    pub target: Option<String>,
    pub side: Option<TradeSide>,
    pub amount: Option<Decimal>,
    pub quote_id: Option<String>,
    pub intent_id: Option<String>,
}

/// POST /withdraw
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WithdrawRequest {
    pub currency: Option<String>,
    pub network: Option<String>,
    pub amount: Option<Decimal>,
    pub address: Option<String>,
    pub memo: Option<String>,
    pub intent_id: Option<String>,
}

/// POST /admin/deposits/:intentId/reject
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// GET /admin/deposits
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDepositsQuery {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

/// Success envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Result of a deposit-address request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositAddressData {
    pub intent_id: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub currency: String,
    pub network: String,
    pub status: ExternalStatus,
}

/// GET /deposit-status/:intentId
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositStatusResponse {
    pub success: bool,
    pub status: ExternalStatus,
    pub data: DepositStatusData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositStatusData {
    pub intent_id: String,
    pub status: ExternalStatus,
    pub address: String,
    pub memo: Option<String>,
    pub currency: String,
    pub network: String,
    pub target_currency: Option<String>,
    pub target_network: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message: String,
}

impl From<&DepositIntent> for DepositStatusData {
    fn from(intent: &DepositIntent) -> Self {
        Self {
            intent_id: intent.id.clone(),
            status: intent.status.external(),
            address: intent.address.clone(),
            memo: intent.memo.clone(),
            currency: intent.currency.clone(),
            network: intent.network.clone(),
            target_currency: intent.target_currency.clone(),
            target_network: intent.target_network.clone(),
            created_at: intent.created_at,
            updated_at: intent.updated_at,
            message: intent.status.client_message().to_string(),
        }
    }
}

/// Admin view of one intent with its transaction records
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositDetail {
    #[serde(flatten)]
    pub intent: DepositIntent,
    pub transactions: Vec<DepositTransaction>,
}

/// GET /admin/stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsData {
    pub deposits: StatusCounts,
}

/// GET /admin/monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    pub detector: String,
    pub is_monitoring: bool,
    pub active_monitors: usize,
}

/// POST /webhooks/obiex
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub hash: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
    pub address: Option<String>,
    pub reference: Option<String>,
}

/// GET /health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: &'static str,
    pub gateway: crate::services::gateway::GatewayMode,
    pub auto_approve: bool,
    pub monitoring: MonitoringStatus,
    pub timestamp: DateTime<Utc>,
}
