//! Chain observer: polls explorers for deposits to approved intents
//!
//! One tokio task per monitored intent. A monitor stops when its deposit has
//! been processed or when it is stopped explicitly; a failed poll cycle is
//! logged and the interval keeps running.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::models::deposit_intent::DepositIntent;
use crate::services::chain_source::{ChainDataSource, ChainLookup, ChainTransaction};
use crate::services::lifecycle::LifecycleError;

/// What the confirmed-deposit handler did with a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositHandling {
    Processed,
    /// Hash already on file; nothing was done
    AlreadyRecorded,
    /// The intent no longer accepts deposits; stop watching it
    IntentClosed,
    /// Transaction carries no value; keep watching
    Ignored,
}

#[async_trait]
pub trait ConfirmedDepositHandler: Send + Sync {
    async fn on_confirmed_deposit(
        &self,
        intent_id: &str,
        tx: &ChainTransaction,
        currency: &str,
    ) -> Result<DepositHandling, LifecycleError>;
}

/// Address to watch on behalf of an intent
#[derive(Debug, Clone, PartialEq)]
pub struct WatchTarget {
    pub intent_id: String,
    pub address: String,
    pub currency: String,
    pub network: String,
}

impl From<&DepositIntent> for WatchTarget {
    fn from(intent: &DepositIntent) -> Self {
        Self {
            intent_id: intent.id.clone(),
            address: intent.address.clone(),
            currency: intent.currency.clone(),
            network: intent.network.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub is_monitoring: bool,
    pub active_monitors: usize,
}

struct Monitor {
    stop: watch::Sender<bool>,
    generation: u64,
}

#[derive(Clone)]
pub struct ChainObserver {
    source: Arc<dyn ChainDataSource>,
    poll_interval: Duration,
    min_confirmations: u64,
    monitors: Arc<Mutex<HashMap<String, Monitor>>>,
    generations: Arc<AtomicU64>,
}

impl ChainObserver {
    pub fn new(source: Arc<dyn ChainDataSource>, poll_interval: Duration, min_confirmations: u64) -> Self {
        Self {
            source,
            poll_interval,
            min_confirmations,
            monitors: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start polling for `target`. Returns false if the intent is already monitored.
    pub fn start_monitoring(&self, target: WatchTarget, handler: Arc<dyn ConfirmedDepositHandler>) -> bool {
        let mut monitors = self.monitors.lock();
        if monitors.contains_key(&target.intent_id) {
            debug!(intent_id = %target.intent_id, address = %target.address, "Already monitoring");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        monitors.insert(
            target.intent_id.clone(),
            Monitor {
                stop: stop_tx,
                generation,
            },
        );

        info!(
            intent_id = %target.intent_id,
            address = %target.address,
            currency = %target.currency,
            network = %target.network,
            interval_secs = self.poll_interval.as_secs_f64(),
            "Starting blockchain monitoring"
        );

        let observer = self.clone();
        tokio::spawn(async move {
            observer.run(target, handler, stop_rx, generation).await;
        });

        true
    }

    /// Cancel polling for an intent. Returns false if it was not monitored.
    pub fn stop_monitoring(&self, intent_id: &str) -> bool {
        match self.monitors.lock().remove(intent_id) {
            Some(monitor) => {
                let _ = monitor.stop.send(true);
                info!(intent_id = %intent_id, "Stopped monitoring");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let drained: Vec<(String, Monitor)> = self.monitors.lock().drain().collect();
        for (intent_id, monitor) in drained {
            let _ = monitor.stop.send(true);
            info!(intent_id = %intent_id, "Stopped monitoring");
        }
    }

    pub fn is_monitoring(&self, intent_id: &str) -> bool {
        self.monitors.lock().contains_key(intent_id)
    }

    pub fn status(&self) -> MonitorSnapshot {
        let active = self.monitors.lock().len();
        MonitorSnapshot {
            is_monitoring: active > 0,
            active_monitors: active,
        }
    }

    async fn run(
        &self,
        target: WatchTarget,
        handler: Arc<dyn ConfirmedDepositHandler>,
        mut stop: watch::Receiver<bool>,
        generation: u64,
    ) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the first poll waits one interval
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = ticker.tick() => {}
            }

            if self.poll_once(&target, handler.as_ref()).await {
                break;
            }
        }

        // Only clear our own entry; a restart may have installed a newer one
        let mut monitors = self.monitors.lock();
        if monitors
            .get(&target.intent_id)
            .is_some_and(|m| m.generation == generation)
        {
            monitors.remove(&target.intent_id);
        }
        debug!(intent_id = %target.intent_id, "Monitor task exited");
    }

    /// One poll cycle. Returns true once a deposit has been processed.
    async fn poll_once(&self, target: &WatchTarget, handler: &dyn ConfirmedDepositHandler) -> bool {
        debug!(intent_id = %target.intent_id, address = %target.address, "Checking for deposits");

        let txs = match self
            .source
            .transactions_to(&target.currency, &target.network, &target.address)
            .await
        {
            Ok(ChainLookup::Found(txs)) => txs,
            Ok(ChainLookup::Unsupported) => {
                warn!(
                    intent_id = %target.intent_id,
                    currency = %target.currency,
                    network = %target.network,
                    "Blockchain monitoring not implemented for this currency/network"
                );
                return false;
            }
            Err(e) => {
                warn!(intent_id = %target.intent_id, address = %target.address, "Chain poll failed: {}", e);
                return false;
            }
        };

        if txs.is_empty() {
            debug!(intent_id = %target.intent_id, "No transactions found");
            return false;
        }

        for tx in &txs {
            if tx.confirmations < self.min_confirmations {
                info!(
                    intent_id = %target.intent_id,
                    tx_hash = %tx.txid,
                    confirmations = tx.confirmations,
                    required = self.min_confirmations,
                    "Waiting for confirmations"
                );
                continue;
            }

            match handler
                .on_confirmed_deposit(&target.intent_id, tx, &target.currency)
                .await
            {
                Ok(DepositHandling::Processed) => return true,
                Ok(DepositHandling::IntentClosed) => {
                    info!(intent_id = %target.intent_id, "Intent no longer approved, ending monitor");
                    return true;
                }
                Ok(DepositHandling::AlreadyRecorded) => {
                    debug!(tx_hash = %tx.txid, "Transaction already processed, skipping");
                }
                Ok(DepositHandling::Ignored) => {
                    debug!(tx_hash = %tx.txid, "Transaction ignored, still watching");
                }
                Err(e) => {
                    error!(intent_id = %target.intent_id, tx_hash = %tx.txid, "Error processing confirmed deposit: {}", e);
                }
            }
        }

        false
    }
}
