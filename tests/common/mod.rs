#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use swap_desk::models::deposit_intent::{DepositIntent, DepositStatus};
use swap_desk::models::gateway::{DepositAddress, Quote, TradeExecution, Withdrawal};
use swap_desk::services::chain_observer::ChainObserver;
use swap_desk::services::chain_source::{
    ChainDataSource, ChainLookup, ChainSourceError, ChainTransaction,
};
use swap_desk::services::detector::{ChainDetector, DepositDetector, SimulatedDetector};
use swap_desk::services::gateway::{
    ExchangeGateway, GatewayError, GatewayMode, TradeOrder, WithdrawalOrder,
};
use swap_desk::services::intent_store::{DbIntentStore, IntentStore};
use swap_desk::services::lifecycle::LifecycleController;
use swap_desk::{router, AppState};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Fresh in-memory SQLite database with all migrations applied
pub async fn setup_test_db() -> DatabaseConnection {
    // A single pooled connection keeps the in-memory database alive and shared
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub async fn setup_store() -> Arc<DbIntentStore> {
    Arc::new(DbIntentStore::new(setup_test_db().await))
}

/// Gateway double with switchable failures and call counters
#[derive(Default)]
pub struct FakeGateway {
    pub fail_addresses: AtomicBool,
    pub fail_trades: AtomicBool,
    pub quotes: AtomicUsize,
    pub trades: AtomicUsize,
    pub withdrawals: AtomicUsize,
    issued: AtomicUsize,
}

impl FakeGateway {
    pub fn failing_addresses() -> Self {
        let gateway = Self::default();
        gateway.fail_addresses.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn failing_trades() -> Self {
        let gateway = Self::default();
        gateway.fail_trades.store(true, Ordering::SeqCst);
        gateway
    }

    fn unavailable() -> GatewayError {
        GatewayError::Api {
            status: 503,
            message: "exchange unavailable".to_string(),
        }
    }
}

#[async_trait]
impl ExchangeGateway for FakeGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Sandbox
    }

    async fn create_quote(&self, order: &TradeOrder) -> Result<Quote, GatewayError> {
        let n = self.quotes.fetch_add(1, Ordering::SeqCst);
        Ok(Quote {
            id: format!("quote-{}", n),
            rate: dec!(2),
            amount_received: order.amount * dec!(2),
            expiry_date: "2099-01-01T00:00:00Z".to_string(),
        })
    }

    async fn trade(
        &self,
        order: &TradeOrder,
        quote_id: Option<&str>,
    ) -> Result<TradeExecution, GatewayError> {
        if self.fail_trades.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let n = self.trades.fetch_add(1, Ordering::SeqCst);
        let id = format!("trade-{}-{}", quote_id.unwrap_or("direct"), n);
        Ok(TradeExecution {
            id: id.clone(),
            status: "COMPLETED".to_string(),
            amount_received: order.amount * dec!(2),
            transaction_id: id,
        })
    }

    async fn get_deposit_address(
        &self,
        currency: &str,
        _network: &str,
        _identifier: &str,
    ) -> Result<DepositAddress, GatewayError> {
        if self.fail_addresses.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(DepositAddress {
            address: format!("fake-{}-{}", currency.to_lowercase(), n),
            memo: None,
        })
    }

    async fn withdraw_crypto(&self, _order: &WithdrawalOrder) -> Result<Withdrawal, GatewayError> {
        let n = self.withdrawals.fetch_add(1, Ordering::SeqCst);
        Ok(Withdrawal {
            transaction_id: format!("withdrawal-{}", n),
            status: "PENDING".to_string(),
            fee: Decimal::ZERO,
        })
    }
}

/// Chain source whose answers are set per address by the test
#[derive(Default)]
pub struct ScriptedChainSource {
    txs: Mutex<HashMap<String, Vec<ChainTransaction>>>,
    pub fail: AtomicBool,
    pub unsupported: AtomicBool,
    pub calls: AtomicUsize,
}

impl ScriptedChainSource {
    pub fn set(&self, address: &str, txs: Vec<ChainTransaction>) {
        self.txs.lock().insert(address.to_string(), txs);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainDataSource for ScriptedChainSource {
    async fn transactions_to(
        &self,
        _currency: &str,
        _network: &str,
        address: &str,
    ) -> Result<ChainLookup, ChainSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChainSourceError::Api("explorer down".to_string()));
        }
        if self.unsupported.load(Ordering::SeqCst) {
            return Ok(ChainLookup::Unsupported);
        }
        Ok(ChainLookup::Found(
            self.txs.lock().get(address).cloned().unwrap_or_default(),
        ))
    }
}

pub fn tx(txid: &str, confirmations: u64, amount: Decimal) -> ChainTransaction {
    ChainTransaction {
        txid: txid.to_string(),
        confirmations,
        amount,
    }
}

pub struct Harness {
    pub store: Arc<DbIntentStore>,
    pub gateway: Arc<FakeGateway>,
    pub source: Arc<ScriptedChainSource>,
    pub detector: Arc<dyn DepositDetector>,
    pub controller: LifecycleController,
}

impl Harness {
    pub async fn intent(&self, id: &str) -> DepositIntent {
        self.store
            .find_by_id(id)
            .await
            .expect("store read failed")
            .expect("intent missing")
    }

    pub async fn wait_for_status(&self, id: &str, status: DepositStatus) -> bool {
        wait_until(Duration::from_secs(3), || async {
            self.intent(id).await.status == status
        })
        .await
    }

    pub fn app(&self) -> axum::Router {
        router(AppState {
            controller: self.controller.clone(),
            admin_api_key: Some(ADMIN_KEY.to_string()),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        })
    }
}

/// Supervised path: manual approval, chain detector over a scripted source
pub async fn chain_harness(gateway: FakeGateway) -> Harness {
    let store = setup_store().await;
    let gateway = Arc::new(gateway);
    let source = Arc::new(ScriptedChainSource::default());
    let observer = ChainObserver::new(source.clone(), POLL_INTERVAL, 2);
    let detector: Arc<dyn DepositDetector> = Arc::new(ChainDetector::new(observer));
    let controller = LifecycleController::new(store.clone(), gateway.clone(), detector.clone(), false);

    Harness {
        store,
        gateway,
        source,
        detector,
        controller,
    }
}

/// Automatic path: auto-approval, simulated detector with the given delays (ms)
pub async fn simulated_harness(detection_ms: (u64, u64), processing_ms: (u64, u64)) -> Harness {
    let store = setup_store().await;
    let gateway = Arc::new(FakeGateway::default());
    let source = Arc::new(ScriptedChainSource::default());
    let detector: Arc<dyn DepositDetector> = Arc::new(SimulatedDetector::new(
        Duration::from_millis(detection_ms.0)..=Duration::from_millis(detection_ms.1),
        Duration::from_millis(processing_ms.0)..=Duration::from_millis(processing_ms.1),
    ));
    let controller = LifecycleController::new(store.clone(), gateway.clone(), detector.clone(), true);

    Harness {
        store,
        gateway,
        source,
        detector,
        controller,
    }
}

/// Poll `check` every 10ms until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
