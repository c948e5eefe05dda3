//! Intent store: the only component that mutates deposit intent status
//!
//! Status changes are conditional updates (`WHERE id = ? AND status IN (...)`),
//! so two concurrent callers starting from the same prior status cannot both
//! succeed. Transaction hashes are unique table-wide; a duplicate insert is
//! reported as "already recorded", not as an error.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{deposit_intents, deposit_transactions, prelude::*};
use crate::models::deposit_intent::{
    DepositIntent, DepositStatus, DepositTransaction, IntentPatch, NewDepositIntent,
    NewDepositTransaction, StatusCounts, TransactionType, PLACEHOLDER_ADDRESS,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Deposit intent {0} not found")]
    NotFound(String),
    /// The intent exists but its current status is not one the caller expected
    #[error("Deposit intent {intent_id} is {current}")]
    StatusConflict {
        intent_id: String,
        current: DepositStatus,
    },
    /// The requested edge is not part of the status graph
    #[error("Illegal status transition {from} -> {to}")]
    IllegalTransition {
        from: DepositStatus,
        to: DepositStatus,
    },
    /// A stored row holds a value outside the closed vocabulary
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Outcome of recording a confirmed on-chain deposit
#[derive(Debug, Clone, PartialEq)]
pub enum DepositRecording {
    /// DEPOSIT row inserted and intent moved APPROVED → CONFIRMED
    Recorded(DepositIntent),
    /// The transaction hash is already on file; nothing changed
    AlreadyRecorded,
}

#[async_trait]
pub trait IntentStore: Send + Sync {
    async fn create(&self, intent: NewDepositIntent) -> Result<DepositIntent, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<DepositIntent>, StoreError>;

    /// Most recent intent with the given deposit address and status
    async fn find_by_address(
        &self,
        address: &str,
        status: DepositStatus,
    ) -> Result<Option<DepositIntent>, StoreError>;

    /// Replace the placeholder address; status is untouched
    async fn set_address(
        &self,
        id: &str,
        address: &str,
        memo: Option<&str>,
    ) -> Result<DepositIntent, StoreError>;

    /// Move the intent to `next` if its stored status is one of `expected`
    async fn update_status(
        &self,
        id: &str,
        expected: &[DepositStatus],
        next: DepositStatus,
        patch: IntentPatch,
    ) -> Result<DepositIntent, StoreError>;

    /// Newest first
    async fn list(
        &self,
        status: Option<DepositStatus>,
        limit: Option<u64>,
    ) -> Result<Vec<DepositIntent>, StoreError>;

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError>;

    /// Append a transaction record. `Ok(None)` when the hash is already recorded.
    async fn record_transaction(
        &self,
        tx: NewDepositTransaction,
    ) -> Result<Option<DepositTransaction>, StoreError>;

    async fn transaction_exists(&self, tx_hash: &str) -> Result<bool, StoreError>;

    /// Oldest first
    async fn transactions_for(&self, intent_id: &str)
        -> Result<Vec<DepositTransaction>, StoreError>;

    /// Insert the DEPOSIT row and move APPROVED → CONFIRMED atomically
    async fn confirm_deposit(
        &self,
        deposit: NewDepositTransaction,
    ) -> Result<DepositRecording, StoreError>;
}

/// SeaORM-backed store (Postgres in production, SQLite locally and in tests)
#[derive(Clone)]
pub struct DbIntentStore {
    db: DatabaseConnection,
}

impl DbIntentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn require(&self, id: &str) -> Result<DepositIntent, StoreError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Explains why a conditional update touched no rows
    async fn conflict(&self, id: &str) -> StoreError {
        match self.find_by_id(id).await {
            Ok(Some(intent)) => StoreError::StatusConflict {
                intent_id: id.to_string(),
                current: intent.status,
            },
            Ok(None) => StoreError::NotFound(id.to_string()),
            Err(e) => e,
        }
    }
}

fn to_intent(model: deposit_intents::Model) -> Result<DepositIntent, StoreError> {
    DepositIntent::try_from(model).map_err(StoreError::Corrupt)
}

fn to_transaction(model: deposit_transactions::Model) -> Result<DepositTransaction, StoreError> {
    DepositTransaction::try_from(model).map_err(StoreError::Corrupt)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn insert_transaction<C: ConnectionTrait>(
    conn: &C,
    tx: NewDepositTransaction,
) -> Result<deposit_transactions::Model, DbErr> {
    let now = Utc::now().fixed_offset();
    deposit_transactions::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        deposit_intent_id: Set(tx.deposit_intent_id),
        tx_hash: Set(tx.tx_hash),
        amount: Set(tx.amount),
        currency: Set(tx.currency),
        tx_type: Set(tx.tx_type.to_string()),
        status: Set(tx.status),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
}

#[async_trait]
impl IntentStore for DbIntentStore {
    async fn create(&self, intent: NewDepositIntent) -> Result<DepositIntent, StoreError> {
        let now = Utc::now().fixed_offset();
        let model = deposit_intents::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(intent.user_id),
            currency: Set(intent.currency),
            network: Set(intent.network),
            target_currency: Set(intent.target_currency),
            target_network: Set(intent.target_network),
            address: Set(PLACEHOLDER_ADDRESS.to_string()),
            memo: Set(None),
            status: Set(intent.status.to_string()),
            rejection_reason: Set(None),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        to_intent(model)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DepositIntent>, StoreError> {
        DepositIntents::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(to_intent)
            .transpose()
    }

    async fn find_by_address(
        &self,
        address: &str,
        status: DepositStatus,
    ) -> Result<Option<DepositIntent>, StoreError> {
        DepositIntents::find()
            .filter(deposit_intents::Column::Address.eq(address))
            .filter(deposit_intents::Column::Status.eq(status.as_str()))
            .order_by_desc(deposit_intents::Column::CreatedAt)
            .one(&self.db)
            .await?
            .map(to_intent)
            .transpose()
    }

    async fn set_address(
        &self,
        id: &str,
        address: &str,
        memo: Option<&str>,
    ) -> Result<DepositIntent, StoreError> {
        let result = DepositIntents::update_many()
            .col_expr(deposit_intents::Column::Address, Expr::value(address))
            .col_expr(
                deposit_intents::Column::Memo,
                Expr::value(memo.map(str::to_string)),
            )
            .col_expr(
                deposit_intents::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(deposit_intents::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.require(id).await
    }

    async fn update_status(
        &self,
        id: &str,
        expected: &[DepositStatus],
        next: DepositStatus,
        patch: IntentPatch,
    ) -> Result<DepositIntent, StoreError> {
        if let Some(from) = expected.iter().find(|from| !from.can_transition_to(next)) {
            return Err(StoreError::IllegalTransition { from: *from, to: next });
        }

        let mut update = DepositIntents::update_many()
            .col_expr(deposit_intents::Column::Status, Expr::value(next.as_str()))
            .col_expr(
                deposit_intents::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            );
        if let Some(reason) = patch.rejection_reason {
            update = update.col_expr(deposit_intents::Column::RejectionReason, Expr::value(reason));
        }
        if let Some(message) = patch.error_message {
            update = update.col_expr(deposit_intents::Column::ErrorMessage, Expr::value(message));
        }

        let result = update
            .filter(deposit_intents::Column::Id.eq(id))
            .filter(deposit_intents::Column::Status.is_in(expected.iter().map(|s| s.as_str())))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(self.conflict(id).await);
        }

        tracing::debug!(intent_id = %id, status = %next, "Deposit intent status updated");
        self.require(id).await
    }

    async fn list(
        &self,
        status: Option<DepositStatus>,
        limit: Option<u64>,
    ) -> Result<Vec<DepositIntent>, StoreError> {
        let mut query = DepositIntents::find();
        if let Some(status) = status {
            query = query.filter(deposit_intents::Column::Status.eq(status.as_str()));
        }

        query
            .order_by_desc(deposit_intents::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_intent)
            .collect()
    }

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError> {
        let mut counts = StatusCounts::default();
        for status in DepositStatus::ALL {
            let count = DepositIntents::find()
                .filter(deposit_intents::Column::Status.eq(status.as_str()))
                .count(&self.db)
                .await?;
            counts.record(status, count);
        }
        Ok(counts)
    }

    async fn record_transaction(
        &self,
        tx: NewDepositTransaction,
    ) -> Result<Option<DepositTransaction>, StoreError> {
        match insert_transaction(&self.db, tx).await {
            Ok(model) => to_transaction(model).map(Some),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn transaction_exists(&self, tx_hash: &str) -> Result<bool, StoreError> {
        let count = DepositTransactions::find()
            .filter(deposit_transactions::Column::TxHash.eq(tx_hash))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn transactions_for(
        &self,
        intent_id: &str,
    ) -> Result<Vec<DepositTransaction>, StoreError> {
        DepositTransactions::find()
            .filter(deposit_transactions::Column::DepositIntentId.eq(intent_id))
            .order_by_asc(deposit_transactions::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_transaction)
            .collect()
    }

    async fn confirm_deposit(
        &self,
        deposit: NewDepositTransaction,
    ) -> Result<DepositRecording, StoreError> {
        debug_assert_eq!(deposit.tx_type, TransactionType::Deposit);
        let intent_id = deposit.deposit_intent_id.clone();

        let txn = self.db.begin().await?;

        if let Err(e) = insert_transaction(&txn, deposit).await {
            txn.rollback().await?;
            if is_unique_violation(&e) {
                return Ok(DepositRecording::AlreadyRecorded);
            }
            return Err(e.into());
        }

        let result = DepositIntents::update_many()
            .col_expr(
                deposit_intents::Column::Status,
                Expr::value(DepositStatus::Confirmed.as_str()),
            )
            .col_expr(
                deposit_intents::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(deposit_intents::Column::Id.eq(intent_id.as_str()))
            .filter(deposit_intents::Column::Status.eq(DepositStatus::Approved.as_str()))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(self.conflict(&intent_id).await);
        }

        txn.commit().await?;
        self.require(&intent_id).await.map(DepositRecording::Recorded)
    }
}
