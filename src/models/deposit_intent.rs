//! Deposit intent domain types and the status graph
//!
//! Status progresses: PENDING → APPROVED → PROCESSING → COMPLETED   (automatic path)
//!                                       ↘ CONFIRMED  → COMPLETED   (chain-verified path)
//!                                                    ↘ SWAP_FAILED
//!                    ↘ REJECTED          PROCESSING/CONFIRMED ↘ FAILED

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{deposit_intents, deposit_transactions};

/// Address stored on an intent until the gateway (or the local generator) supplies one
pub const PLACEHOLDER_ADDRESS: &str = "PENDING_ADDRESS_GENERATION";

/// Internal intent status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    Pending,
    Approved,
    Processing,
    Confirmed,
    Completed,
    Rejected,
    Failed,
    SwapFailed,
}

impl DepositStatus {
    pub const ALL: [DepositStatus; 8] = [
        DepositStatus::Pending,
        DepositStatus::Approved,
        DepositStatus::Processing,
        DepositStatus::Confirmed,
        DepositStatus::Completed,
        DepositStatus::Rejected,
        DepositStatus::Failed,
        DepositStatus::SwapFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "PENDING",
            DepositStatus::Approved => "APPROVED",
            DepositStatus::Processing => "PROCESSING",
            DepositStatus::Confirmed => "CONFIRMED",
            DepositStatus::Completed => "COMPLETED",
            DepositStatus::Rejected => "REJECTED",
            DepositStatus::Failed => "FAILED",
            DepositStatus::SwapFailed => "SWAP_FAILED",
        }
    }

    /// Statuses reachable in one step. Terminal statuses have none.
    pub fn successors(&self) -> &'static [DepositStatus] {
        use DepositStatus::*;
        match self {
            Pending => &[Approved, Rejected],
            Approved => &[Processing, Confirmed],
            Processing => &[Completed, Failed],
            Confirmed => &[Completed, Rejected, Failed, SwapFailed],
            Completed | Rejected | Failed | SwapFailed => &[],
        }
    }

    pub fn can_transition_to(&self, next: DepositStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Coarse status shown to polling clients
    pub fn external(&self) -> ExternalStatus {
        match self {
            DepositStatus::Pending => ExternalStatus::Pending,
            DepositStatus::Approved
            | DepositStatus::Processing
            | DepositStatus::Confirmed
            | DepositStatus::Completed => ExternalStatus::Approved,
            DepositStatus::Rejected | DepositStatus::Failed | DepositStatus::SwapFailed => {
                ExternalStatus::Rejected
            }
        }
    }

    /// Human-readable progress message for status polling
    pub fn client_message(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "Deposit request received. Waiting for review...",
            DepositStatus::Approved => "Deposit address generated. Waiting for your deposit...",
            DepositStatus::Processing | DepositStatus::Confirmed => {
                "Deposit detected! Processing your swap..."
            }
            DepositStatus::Completed => "Swap completed successfully!",
            DepositStatus::Rejected => "Deposit request was rejected.",
            DepositStatus::Failed | DepositStatus::SwapFailed => {
                "Swap processing failed. Please contact support."
            }
        }
    }
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DepositStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown deposit status: {}", s))
    }
}

/// Status vocabulary exposed to API consumers: waiting, success, failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Kind of a recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Swap,
    Withdrawal,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "DEPOSIT"),
            TransactionType::Swap => write!(f, "SWAP"),
            TransactionType::Withdrawal => write!(f, "WITHDRAWAL"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "SWAP" => Ok(TransactionType::Swap),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

/// A deposit intent as seen by the lifecycle controller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositIntent {
    pub id: String,
    pub user_id: String,
    pub currency: String,
    pub network: String,
    pub target_currency: Option<String>,
    pub target_network: Option<String>,
    pub address: String,
    pub memo: Option<String>,
    pub status: DepositStatus,
    pub rejection_reason: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DepositIntent {
    pub fn has_address(&self) -> bool {
        self.address != PLACEHOLDER_ADDRESS
    }
}

impl TryFrom<deposit_intents::Model> for DepositIntent {
    type Error = String;

    fn try_from(model: deposit_intents::Model) -> Result<Self, Self::Error> {
        let status = model.status.parse()?;
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            currency: model.currency,
            network: model.network,
            target_currency: model.target_currency,
            target_network: model.target_network,
            address: model.address,
            memo: model.memo,
            status,
            rejection_reason: model.rejection_reason,
            error_message: model.error_message,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

/// Fields supplied when an intent is created
#[derive(Debug, Clone)]
pub struct NewDepositIntent {
    pub user_id: String,
    pub currency: String,
    pub network: String,
    pub target_currency: Option<String>,
    pub target_network: Option<String>,
    pub status: DepositStatus,
}

/// Extra fields written alongside a status change
#[derive(Debug, Clone, Default)]
pub struct IntentPatch {
    pub rejection_reason: Option<String>,
    pub error_message: Option<String>,
}

impl IntentPatch {
    pub fn rejection(reason: impl Into<String>) -> Self {
        Self {
            rejection_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// A recorded on-chain observation or exchange operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositTransaction {
    pub id: String,
    pub deposit_intent_id: String,
    pub tx_hash: String,
    pub amount: String,
    pub currency: String,
    pub tx_type: TransactionType,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<deposit_transactions::Model> for DepositTransaction {
    type Error = String;

    fn try_from(model: deposit_transactions::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            deposit_intent_id: model.deposit_intent_id,
            tx_hash: model.tx_hash,
            amount: model.amount,
            currency: model.currency,
            tx_type: model.tx_type.parse()?,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

/// Transaction record to append
#[derive(Debug, Clone)]
pub struct NewDepositTransaction {
    pub deposit_intent_id: String,
    pub tx_hash: String,
    pub amount: String,
    pub currency: String,
    pub tx_type: TransactionType,
    pub status: String,
}

/// Intent counts per status plus the overall total
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: u64,
    pub approved: u64,
    pub processing: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub rejected: u64,
    pub failed: u64,
    pub swap_failed: u64,
    pub total: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: DepositStatus, count: u64) {
        let slot = match status {
            DepositStatus::Pending => &mut self.pending,
            DepositStatus::Approved => &mut self.approved,
            DepositStatus::Processing => &mut self.processing,
            DepositStatus::Confirmed => &mut self.confirmed,
            DepositStatus::Completed => &mut self.completed,
            DepositStatus::Rejected => &mut self.rejected,
            DepositStatus::Failed => &mut self.failed,
            DepositStatus::SwapFailed => &mut self.swap_failed,
        };
        *slot += count;
        self.total += count;
    }
}
