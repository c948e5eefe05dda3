//! Intent lifecycle controller
//!
//! Orchestrates intent creation, address issuance, approval, deposit
//! detection and the post-deposit conversion. All status changes go through
//! the intent store's guarded updates; this module never writes a status
//! without naming the status it expects to replace.

use async_trait::async_trait;
use axum::http::StatusCode;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::models::api::{
    DepositAddressData, DepositAddressRequest, DepositDetail, MonitoringStatus, QuoteRequest,
    TradeRequest, WebhookEvent, WithdrawRequest,
};
use crate::models::deposit_intent::{
    DepositIntent, DepositStatus, IntentPatch, NewDepositIntent, NewDepositTransaction,
    StatusCounts, TransactionType,
};
use crate::models::gateway::{DepositAddress, Quote, TradeExecution, TradeSide, Withdrawal};
use crate::services::chain_observer::{ConfirmedDepositHandler, DepositHandling};
use crate::services::chain_source::ChainTransaction;
use crate::services::detector::DepositDetector;
use crate::services::gateway::{
    ExchangeGateway, GatewayError, GatewayMode, TradeOrder, WithdrawalOrder,
};
use crate::services::intent_store::{DepositRecording, IntentStore, StoreError};

const DEFAULT_LIST_LIMIT: u64 = 100;
const MAX_LIST_LIMIT: u64 = 500;
const MOCK_ADDRESS_MAX_LEN: usize = 42;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("Deposit intent {0} not found")]
    NotFound(String),
    /// Transition attempted from the wrong status
    #[error("Deposit intent {intent_id} cannot make that transition from {current}")]
    InvalidStatus {
        intent_id: String,
        current: DepositStatus,
    },
    /// Trade or withdrawal against an intent that is not APPROVED
    #[error("Deposit intent {intent_id} is {current}; admin approval required")]
    NotApproved {
        intent_id: String,
        current: DepositStatus,
    },
    #[error("Missing API key")]
    Unauthorized,
    #[error("Invalid API key")]
    Forbidden,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Conflicts and misses are mapped to their own variants in `From<StoreError>`
    #[error(transparent)]
    Store(StoreError),
}

impl LifecycleError {
    pub fn validation(message: impl Into<String>) -> Self {
        LifecycleError::Validation {
            message: message.into(),
            details: None,
        }
    }

    fn missing_fields(fields: &[&'static str]) -> Self {
        LifecycleError::Validation {
            message: format!("Missing required fields: {}", fields.join(", ")),
            details: Some(json!({ "missingFields": fields })),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::Validation { .. } => "VALIDATION_ERROR",
            LifecycleError::NotFound(_) => "NOT_FOUND",
            LifecycleError::InvalidStatus { .. } => "INVALID_STATUS",
            LifecycleError::NotApproved { .. } => "NOT_APPROVED",
            LifecycleError::Unauthorized => "UNAUTHORIZED",
            LifecycleError::Forbidden => "FORBIDDEN",
            LifecycleError::Gateway(_) => "GATEWAY_ERROR",
            LifecycleError::Store(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LifecycleError::Validation { .. } | LifecycleError::InvalidStatus { .. } => {
                StatusCode::BAD_REQUEST
            }
            LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
            LifecycleError::NotApproved { .. } | LifecycleError::Forbidden => StatusCode::FORBIDDEN,
            LifecycleError::Unauthorized => StatusCode::UNAUTHORIZED,
            LifecycleError::Gateway(_) => StatusCode::BAD_GATEWAY,
            LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured payload for the error envelope
    pub fn details(&self) -> Option<Value> {
        match self {
            LifecycleError::Validation { details, .. } => details.clone(),
            LifecycleError::InvalidStatus { current, .. }
            | LifecycleError::NotApproved { current, .. } => {
                Some(json!({ "currentStatus": current }))
            }
            _ => None,
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => LifecycleError::NotFound(id),
            StoreError::StatusConflict { intent_id, current } => {
                LifecycleError::InvalidStatus { intent_id, current }
            }
            other => LifecycleError::Store(other),
        }
    }
}

/// Collects missing request fields so they are reported together
#[derive(Default)]
struct Required {
    missing: Vec<&'static str>,
}

impl Required {
    fn text(&mut self, name: &'static str, value: Option<String>) -> String {
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                self.missing.push(name);
                String::new()
            }
        }
    }

    fn check(&mut self, name: &'static str, present: bool) {
        if !present {
            self.missing.push(name);
        }
    }

    fn finish(self) -> Result<(), LifecycleError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::missing_fields(&self.missing))
        }
    }
}

fn positive_amount(amount: Option<Decimal>) -> Result<Decimal, LifecycleError> {
    match amount {
        Some(a) if a > Decimal::ZERO => Ok(a),
        Some(a) => Err(LifecycleError::Validation {
            message: "Amount must be a positive number".to_string(),
            details: Some(json!({ "received": a })),
        }),
        None => Err(LifecycleError::missing_fields(&["amount"])),
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Locally synthesized address used when the gateway cannot issue one
pub fn mock_address(currency: &str) -> String {
    let timestamp = base36(chrono::Utc::now().timestamp_millis().unsigned_abs());
    let random = random_base36(6);
    let prefix = match currency.to_uppercase().as_str() {
        "BTC" => "bc1q".to_string(),
        "ETH" | "USDT" | "USDC" => "0x".to_string(),
        "LTC" => "ltc1q".to_string(),
        other => format!("{}1q", other.to_lowercase()),
    };

    let mut address = format!("{}{}{}", prefix, random, timestamp);
    address.truncate(MOCK_ADDRESS_MAX_LEN);
    address
}

fn default_identifier() -> String {
    format!(
        "deposit_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        random_base36(9)
    )
}

/// What the webhook path did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    AlreadyRecorded,
    Ignored,
}

/// Startup recovery summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub rearmed: usize,
    /// APPROVED intents that were still waiting for an address
    pub readdressed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct LifecycleController {
    store: Arc<dyn IntentStore>,
    gateway: Arc<dyn ExchangeGateway>,
    detector: Arc<dyn DepositDetector>,
    auto_approve: bool,
}

impl LifecycleController {
    pub fn new(
        store: Arc<dyn IntentStore>,
        gateway: Arc<dyn ExchangeGateway>,
        detector: Arc<dyn DepositDetector>,
        auto_approve: bool,
    ) -> Self {
        Self {
            store,
            gateway,
            detector,
            auto_approve,
        }
    }

    pub fn auto_approve(&self) -> bool {
        self.auto_approve
    }

    pub fn gateway_mode(&self) -> GatewayMode {
        self.gateway.mode()
    }

    async fn require_intent(&self, intent_id: &str) -> Result<DepositIntent, LifecycleError> {
        self.store
            .find_by_id(intent_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(intent_id.to_string()))
    }

    /// Create an intent and give it a deposit address.
    ///
    /// The address comes from the gateway when it answers; otherwise a local
    /// placeholder is synthesized so the request never fails on the gateway.
    pub async fn request_deposit_address(
        &self,
        req: DepositAddressRequest,
    ) -> Result<DepositAddressData, LifecycleError> {
        let mut fields = Required::default();
        let currency = fields.text("currency", req.currency);
        let network = fields.text("network", req.network);
        let user_id = fields.text("userId", req.user_id);
        fields.finish()?;

        let status = if self.auto_approve {
            DepositStatus::Approved
        } else {
            DepositStatus::Pending
        };

        let intent = self
            .store
            .create(NewDepositIntent {
                user_id,
                currency,
                network,
                target_currency: optional_text(req.target_currency),
                target_network: optional_text(req.target_network),
                status,
            })
            .await?;

        info!(intent_id = %intent.id, user_id = %intent.user_id, status = %intent.status, "Created deposit intent");

        let identifier = optional_text(req.identifier).unwrap_or_else(default_identifier);
        let intent = self.issue_address(&intent, &identifier).await?;

        if intent.status == DepositStatus::Approved {
            self.detector.watch(&intent, self.clone());
        }

        Ok(DepositAddressData {
            intent_id: intent.id,
            address: intent.address,
            memo: intent.memo,
            currency: intent.currency,
            network: intent.network,
            status: intent.status.external(),
        })
    }

    /// Ask the gateway for an address, falling back to a local one, and store it
    async fn issue_address(
        &self,
        intent: &DepositIntent,
        identifier: &str,
    ) -> Result<DepositIntent, LifecycleError> {
        let issued = match self
            .gateway
            .get_deposit_address(&intent.currency, &intent.network, identifier)
            .await
        {
            Ok(address) => address,
            Err(e) => {
                warn!(intent_id = %intent.id, "Gateway address generation failed, using local address: {}", e);
                DepositAddress {
                    address: mock_address(&intent.currency),
                    memo: None,
                }
            }
        };

        Ok(self
            .store
            .set_address(&intent.id, &issued.address, issued.memo.as_deref())
            .await?)
    }

    pub async fn deposit_status(&self, intent_id: &str) -> Result<DepositIntent, LifecycleError> {
        self.require_intent(intent_id).await
    }

    /// PENDING → APPROVED, then arm deposit detection
    pub async fn approve(&self, intent_id: &str) -> Result<DepositIntent, LifecycleError> {
        let intent = self.require_intent(intent_id).await?;
        if intent.status != DepositStatus::Pending {
            return Err(LifecycleError::InvalidStatus {
                intent_id: intent_id.to_string(),
                current: intent.status,
            });
        }

        let intent = self
            .store
            .update_status(
                intent_id,
                &[DepositStatus::Pending],
                DepositStatus::Approved,
                IntentPatch::default(),
            )
            .await?;

        info!(intent_id = %intent_id, "Deposit intent approved");
        let intent = if intent.has_address() {
            intent
        } else {
            self.issue_address(&intent, &default_identifier()).await?
        };
        self.detector.watch(&intent, self.clone());
        Ok(intent)
    }

    /// PENDING or CONFIRMED → REJECTED with a reason
    pub async fn reject(
        &self,
        intent_id: &str,
        reason: Option<String>,
    ) -> Result<DepositIntent, LifecycleError> {
        let reason = optional_text(reason)
            .ok_or_else(|| LifecycleError::validation("Rejection reason is required"))?;

        let rejectable = [DepositStatus::Pending, DepositStatus::Confirmed];
        let intent = self.require_intent(intent_id).await?;
        if !rejectable.contains(&intent.status) {
            return Err(LifecycleError::InvalidStatus {
                intent_id: intent_id.to_string(),
                current: intent.status,
            });
        }

        let intent = self
            .store
            .update_status(
                intent_id,
                &rejectable,
                DepositStatus::Rejected,
                IntentPatch::rejection(reason),
            )
            .await?;

        info!(intent_id = %intent_id, "Deposit intent rejected");
        self.detector.unwatch(intent_id);
        Ok(intent)
    }

    pub async fn create_quote(&self, req: QuoteRequest) -> Result<Quote, LifecycleError> {
        let mut fields = Required::default();
        let source = fields.text("source", req.source);
        let target = fields.text("target", req.target);
        fields.check("side", req.side.is_some());
        fields.check("amount", req.amount.is_some());
        fields.finish()?;

        let side = req
            .side
            .ok_or_else(|| LifecycleError::missing_fields(&["side"]))?;
        let order = TradeOrder {
            source,
            target,
            side,
            amount: positive_amount(req.amount)?,
        };

        Ok(self.gateway.create_quote(&order).await?)
    }

    /// Fresh read of the stored status; approval captured earlier does not count
    async fn ensure_approved(&self, intent_id: &str) -> Result<DepositIntent, LifecycleError> {
        let intent = self.require_intent(intent_id).await?;
        if intent.status != DepositStatus::Approved {
            warn!(intent_id = %intent_id, status = %intent.status, "Operation refused, intent not approved");
            return Err(LifecycleError::NotApproved {
                intent_id: intent_id.to_string(),
                current: intent.status,
            });
        }
        Ok(intent)
    }

    async fn append_record(&self, record: NewDepositTransaction) {
        let tx_hash = record.tx_hash.clone();
        match self.store.record_transaction(record).await {
            Ok(Some(tx)) => {
                debug!(intent_id = %tx.deposit_intent_id, tx_hash = %tx.tx_hash, tx_type = %tx.tx_type, "Recorded transaction")
            }
            Ok(None) => warn!(tx_hash = %tx_hash, "Transaction already recorded"),
            Err(e) => error!(tx_hash = %tx_hash, "Failed to record transaction: {}", e),
        }
    }

    /// Trade against an APPROVED intent. Appends a SWAP record; status is unchanged.
    pub async fn execute_trade(&self, req: TradeRequest) -> Result<TradeExecution, LifecycleError> {
        let mut fields = Required::default();
        let source = fields.text("source", req.source);
        let target = fields.text("target", req.target);
        fields.check("side", req.side.is_some());
        fields.check("amount", req.amount.is_some());
        let intent_id = fields.text("intentId", req.intent_id);
        fields.finish()?;

        let side = req
            .side
            .ok_or_else(|| LifecycleError::missing_fields(&["side"]))?;
        let order = TradeOrder {
            source,
            target,
            side,
            amount: positive_amount(req.amount)?,
        };

        self.ensure_approved(&intent_id).await?;

        info!(intent_id = %intent_id, source = %order.source, target = %order.target, "Executing approved trade");
        let trade = self
            .gateway
            .trade(&order, optional_text(req.quote_id).as_deref())
            .await?;

        self.append_record(NewDepositTransaction {
            deposit_intent_id: intent_id,
            tx_hash: trade.transaction_id.clone(),
            amount: trade.amount_received.to_string(),
            currency: order.target,
            tx_type: TransactionType::Swap,
            status: trade.status.clone(),
        })
        .await;

        Ok(trade)
    }

    /// Withdraw against an APPROVED intent. Appends a WITHDRAWAL record; status is unchanged.
    pub async fn process_withdrawal(&self, req: WithdrawRequest) -> Result<Withdrawal, LifecycleError> {
        let mut fields = Required::default();
        let currency = fields.text("currency", req.currency);
        let network = fields.text("network", req.network);
        fields.check("amount", req.amount.is_some());
        let address = fields.text("address", req.address);
        let intent_id = fields.text("intentId", req.intent_id);
        fields.finish()?;

        let order = WithdrawalOrder {
            currency,
            network,
            amount: positive_amount(req.amount)?,
            address,
            memo: optional_text(req.memo),
        };

        self.ensure_approved(&intent_id).await?;

        info!(intent_id = %intent_id, currency = %order.currency, amount = %order.amount, "Processing approved withdrawal");
        let withdrawal = self.gateway.withdraw_crypto(&order).await?;

        self.append_record(NewDepositTransaction {
            deposit_intent_id: intent_id,
            tx_hash: withdrawal.transaction_id.clone(),
            amount: order.amount.to_string(),
            currency: order.currency,
            tx_type: TransactionType::Withdrawal,
            status: withdrawal.status.clone(),
        })
        .await;

        Ok(withdrawal)
    }

    /// Automatic path after simulated detection: APPROVED → PROCESSING → COMPLETED.
    /// Any failure after PROCESSING forces FAILED; there is no retry.
    pub async fn process_simulated_deposit(&self, intent_id: &str, processing_delay: Duration) {
        match self
            .store
            .update_status(
                intent_id,
                &[DepositStatus::Approved],
                DepositStatus::Processing,
                IntentPatch::default(),
            )
            .await
        {
            Ok(_) => info!(intent_id = %intent_id, "Deposit detected, processing swap"),
            Err(StoreError::StatusConflict { current, .. }) => {
                info!(intent_id = %intent_id, status = %current, "Intent no longer approved, skipping automatic processing");
                return;
            }
            Err(e) => {
                error!(intent_id = %intent_id, "Failed to start automatic processing: {}", e);
                return;
            }
        }

        tokio::time::sleep(processing_delay).await;

        let completed = self
            .store
            .update_status(
                intent_id,
                &[DepositStatus::Processing],
                DepositStatus::Completed,
                IntentPatch::default(),
            )
            .await;

        match completed {
            Ok(_) => info!(intent_id = %intent_id, "Automatic swap completed"),
            Err(e) => {
                error!(intent_id = %intent_id, "Automatic processing failed: {}", e);
                if let Err(e) = self
                    .store
                    .update_status(
                        intent_id,
                        &[DepositStatus::Processing],
                        DepositStatus::Failed,
                        IntentPatch::error(e.to_string()),
                    )
                    .await
                {
                    error!(intent_id = %intent_id, "Could not mark intent failed: {}", e);
                }
            }
        }
    }

    /// Quote then trade the deposited amount into the target currency
    async fn convert_deposit(&self, intent: &DepositIntent, tx: &ChainTransaction, currency: &str, target: &str) {
        info!(intent_id = %intent.id, target = %target, "Initiating automatic swap");

        let order = TradeOrder {
            source: currency.to_string(),
            target: target.to_string(),
            side: TradeSide::Sell,
            amount: tx.amount,
        };

        let result: Result<TradeExecution, GatewayError> = async {
            let quote = self.gateway.create_quote(&order).await?;
            self.gateway.trade(&order, Some(&quote.id)).await
        }
        .await;

        let (next, patch) = match result {
            Ok(trade) => {
                self.append_record(NewDepositTransaction {
                    deposit_intent_id: intent.id.clone(),
                    tx_hash: trade.transaction_id.clone(),
                    amount: trade.amount_received.to_string(),
                    currency: target.to_string(),
                    tx_type: TransactionType::Swap,
                    status: "COMPLETED".to_string(),
                })
                .await;
                info!(intent_id = %intent.id, tx_hash = %trade.transaction_id, "Automatic swap completed");
                (DepositStatus::Completed, IntentPatch::default())
            }
            Err(e) => {
                error!(intent_id = %intent.id, "Automatic swap failed: {}", e);
                (DepositStatus::SwapFailed, IntentPatch::error(e.to_string()))
            }
        };

        if let Err(e) = self
            .store
            .update_status(&intent.id, &[DepositStatus::Confirmed], next, patch)
            .await
        {
            error!(intent_id = %intent.id, status = %next, "Failed to record swap outcome: {}", e);
        }
    }

    /// Gateway webhook: a confirmed DEPOSIT to an approved intent's address
    /// goes through the same handler as chain observations.
    pub async fn handle_webhook_deposit(&self, event: WebhookEvent) -> Result<WebhookOutcome, LifecycleError> {
        let is_confirmed_deposit = event.event_type.eq_ignore_ascii_case("DEPOSIT")
            && event.status.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("CONFIRMED"));
        if !is_confirmed_deposit {
            debug!(event_type = %event.event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored);
        }

        let (Some(address), Some(hash)) = (optional_text(event.address), optional_text(event.hash)) else {
            warn!("Deposit webhook without address or hash");
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(intent) = self
            .store
            .find_by_address(&address, DepositStatus::Approved)
            .await?
        else {
            info!(address = %address, tx_hash = %hash, "No approved intent for webhook deposit");
            return Ok(WebhookOutcome::Ignored);
        };

        let tx = ChainTransaction {
            txid: hash,
            // Gateway does not report depth, only that it is confirmed
            confirmations: 0,
            amount: event.amount.unwrap_or_default(),
        };
        let currency = optional_text(event.currency).unwrap_or_else(|| intent.currency.clone());

        Ok(match self.on_confirmed_deposit(&intent.id, &tx, &currency).await? {
            DepositHandling::Processed => WebhookOutcome::Processed,
            DepositHandling::AlreadyRecorded => WebhookOutcome::AlreadyRecorded,
            DepositHandling::IntentClosed | DepositHandling::Ignored => WebhookOutcome::Ignored,
        })
    }

    pub async fn stats(&self) -> Result<StatusCounts, LifecycleError> {
        Ok(self.store.count_by_status().await?)
    }

    pub async fn list(
        &self,
        status: Option<String>,
        limit: Option<u64>,
    ) -> Result<Vec<DepositIntent>, LifecycleError> {
        let status = match optional_text(status) {
            Some(raw) => Some(raw.to_uppercase().parse::<DepositStatus>().map_err(|message| {
                LifecycleError::Validation {
                    message,
                    details: Some(json!({ "allowed": DepositStatus::ALL })),
                }
            })?),
            None => None,
        };
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

        Ok(self.store.list(status, Some(limit)).await?)
    }

    pub async fn detail(&self, intent_id: &str) -> Result<DepositDetail, LifecycleError> {
        let intent = self.require_intent(intent_id).await?;
        let transactions = self.store.transactions_for(intent_id).await?;
        Ok(DepositDetail {
            intent,
            transactions,
        })
    }

    /// External stop of deposit detection. Returns false if nothing was armed.
    pub async fn stop_monitoring(&self, intent_id: &str) -> Result<bool, LifecycleError> {
        self.require_intent(intent_id).await?;
        Ok(self.detector.unwatch(intent_id))
    }

    pub fn monitoring_status(&self) -> MonitoringStatus {
        let active = self.detector.active();
        MonitoringStatus {
            detector: self.detector.name().to_string(),
            is_monitoring: active > 0,
            active_monitors: active,
        }
    }

    pub fn shutdown(&self) {
        self.detector.stop_all();
    }

    /// Rebuild runtime detection state from the store after a restart.
    ///
    /// APPROVED intents are re-armed. PROCESSING intents were interrupted
    /// mid automatic flow and are forced to FAILED.
    pub async fn resume_monitoring(&self) -> Result<RecoveryReport, LifecycleError> {
        let mut report = RecoveryReport::default();

        for intent in self.store.list(Some(DepositStatus::Processing), None).await? {
            match self
                .store
                .update_status(
                    &intent.id,
                    &[DepositStatus::Processing],
                    DepositStatus::Failed,
                    IntentPatch::error("Processing interrupted by restart"),
                )
                .await
            {
                Ok(_) => {
                    warn!(intent_id = %intent.id, "Interrupted processing marked failed");
                    report.failed += 1;
                }
                Err(e) => error!(intent_id = %intent.id, "Could not fail interrupted intent: {}", e),
            }
        }

        for intent in self.store.list(Some(DepositStatus::Approved), None).await? {
            // Interrupted between creation and address issuance
            let intent = if intent.has_address() {
                intent
            } else {
                match self.issue_address(&intent, &default_identifier()).await {
                    Ok(addressed) => {
                        info!(intent_id = %addressed.id, address = %addressed.address, "Issued missing deposit address");
                        report.readdressed += 1;
                        addressed
                    }
                    Err(e) => {
                        error!(intent_id = %intent.id, "Could not issue deposit address: {}", e);
                        continue;
                    }
                }
            };

            if self.detector.watch(&intent, self.clone()) {
                report.rearmed += 1;
            }
        }

        info!(
            rearmed = report.rearmed,
            readdressed = report.readdressed,
            failed = report.failed,
            detector = self.detector.name(),
            "Monitoring resumed"
        );
        Ok(report)
    }
}

#[async_trait]
impl ConfirmedDepositHandler for LifecycleController {
    async fn on_confirmed_deposit(
        &self,
        intent_id: &str,
        tx: &ChainTransaction,
        currency: &str,
    ) -> Result<DepositHandling, LifecycleError> {
        if tx.amount <= Decimal::ZERO {
            warn!(intent_id = %intent_id, tx_hash = %tx.txid, amount = %tx.amount, "Ignoring deposit without a positive amount");
            return Ok(DepositHandling::Ignored);
        }

        if self.store.transaction_exists(&tx.txid).await? {
            return Ok(DepositHandling::AlreadyRecorded);
        }

        let intent = self.require_intent(intent_id).await?;
        if intent.status != DepositStatus::Approved {
            warn!(intent_id = %intent_id, status = %intent.status, tx_hash = %tx.txid, "Deposit seen for intent that is not approved");
            return Ok(DepositHandling::IntentClosed);
        }

        info!(intent_id = %intent_id, tx_hash = %tx.txid, amount = %tx.amount, currency = %currency, "Processing confirmed deposit");

        let recorded = self
            .store
            .confirm_deposit(NewDepositTransaction {
                deposit_intent_id: intent_id.to_string(),
                tx_hash: tx.txid.clone(),
                amount: tx.amount.to_string(),
                currency: currency.to_string(),
                tx_type: TransactionType::Deposit,
                status: "CONFIRMED".to_string(),
            })
            .await;

        let intent = match recorded {
            Ok(DepositRecording::Recorded(intent)) => intent,
            Ok(DepositRecording::AlreadyRecorded) => return Ok(DepositHandling::AlreadyRecorded),
            Err(StoreError::StatusConflict { current, .. }) => {
                warn!(intent_id = %intent_id, status = %current, "Intent changed status before deposit could be confirmed");
                return Ok(DepositHandling::IntentClosed);
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(target) = intent.target_currency.clone() {
            self.convert_deposit(&intent, tx, currency, &target).await;
        }

        self.detector.unwatch(intent_id);
        Ok(DepositHandling::Processed)
    }
}
