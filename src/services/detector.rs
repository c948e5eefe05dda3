//! Deposit detectors arm approved intents for deposit detection
//!
//! `ChainDetector` hands the intent's address to the chain observer.
//! `SimulatedDetector` waits a random delay and then drives the intent
//! through PROCESSING to COMPLETED without touching any chain.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::models::deposit_intent::DepositIntent;
use crate::services::chain_observer::{ChainObserver, WatchTarget};
use crate::services::lifecycle::LifecycleController;

pub trait DepositDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Arm detection for an APPROVED intent. Arming twice is a no-op.
    /// Returns false when the intent cannot be watched.
    fn watch(&self, intent: &DepositIntent, controller: LifecycleController) -> bool;

    /// Disarm detection. Returns false if nothing was armed.
    fn unwatch(&self, intent_id: &str) -> bool;

    fn active(&self) -> usize;

    fn stop_all(&self);
}

pub struct ChainDetector {
    observer: ChainObserver,
}

impl ChainDetector {
    pub fn new(observer: ChainObserver) -> Self {
        Self { observer }
    }
}

impl DepositDetector for ChainDetector {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn watch(&self, intent: &DepositIntent, controller: LifecycleController) -> bool {
        if !intent.has_address() {
            warn!(intent_id = %intent.id, "Intent has no deposit address yet, not monitoring");
            return false;
        }
        self.observer
            .start_monitoring(WatchTarget::from(intent), Arc::new(controller));
        true
    }

    fn unwatch(&self, intent_id: &str) -> bool {
        self.observer.stop_monitoring(intent_id)
    }

    fn active(&self) -> usize {
        self.observer.status().active_monitors
    }

    fn stop_all(&self) {
        self.observer.stop_all();
    }
}

struct PendingTimer {
    generation: u64,
    abort: AbortHandle,
}

/// Demo detector: pretends a deposit arrived after a random delay
pub struct SimulatedDetector {
    detection_delay: RangeInclusive<Duration>,
    processing_delay: RangeInclusive<Duration>,
    pending: Arc<Mutex<HashMap<String, PendingTimer>>>,
    generations: AtomicU64,
}

impl SimulatedDetector {
    pub fn new(
        detection_delay: RangeInclusive<Duration>,
        processing_delay: RangeInclusive<Duration>,
    ) -> Self {
        Self {
            detection_delay,
            processing_delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }
}

/// Uniform sample from an inclusive millisecond range
fn sample_delay(range: &RangeInclusive<Duration>) -> Duration {
    let lo = range.start().as_millis() as u64;
    let hi = range.end().as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi.max(lo)))
}

impl DepositDetector for SimulatedDetector {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn watch(&self, intent: &DepositIntent, controller: LifecycleController) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains_key(&intent.id) {
            debug!(intent_id = %intent.id, "Automatic processing already scheduled");
            return true;
        }

        let detection = sample_delay(&self.detection_delay);
        let processing = sample_delay(&self.processing_delay);
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let intent_id = intent.id.clone();
        let timers = Arc::clone(&self.pending);

        info!(
            intent_id = %intent_id,
            delay_ms = detection.as_millis() as u64,
            "Scheduling automatic processing"
        );

        let task = tokio::spawn(async move {
            tokio::time::sleep(detection).await;

            // Past this point the timer can no longer be cancelled
            {
                let mut timers = timers.lock();
                if timers
                    .get(&intent_id)
                    .is_some_and(|t| t.generation == generation)
                {
                    timers.remove(&intent_id);
                }
            }

            controller
                .process_simulated_deposit(&intent_id, processing)
                .await;
        });

        pending.insert(
            intent.id.clone(),
            PendingTimer {
                generation,
                abort: task.abort_handle(),
            },
        );
        true
    }

    fn unwatch(&self, intent_id: &str) -> bool {
        match self.pending.lock().remove(intent_id) {
            Some(timer) => {
                timer.abort.abort();
                info!(intent_id = %intent_id, "Cancelled automatic processing");
                true
            }
            None => false,
        }
    }

    fn active(&self) -> usize {
        self.pending.lock().len()
    }

    fn stop_all(&self) {
        for (_, timer) in self.pending.lock().drain() {
            timer.abort.abort();
        }
    }
}
