//! Background recomputation
//!
//! Repeated triggers for a user collapse into one debounced sweep; a new
//! trigger replaces the pending one, never stacks. The sweep walks every
//! active pair across the standard time ranges, recomputing window scores
//! and the lag sweep, yielding between batches so interactive work is
//! never starved. Cancellation is observed at batch boundaries only -
//! a single pair always finishes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::types::DateRange;
use crate::orchestrator::Orchestrator;

/// Time ranges swept for every pair, in days
pub const SWEEP_RANGES_DAYS: [i64; 3] = [7, 30, 90];

struct UserTask {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct Inner {
    orchestrator: Arc<Orchestrator>,
    tasks: Mutex<HashMap<String, UserTask>>,
}

/// Debounced per-user background recompute
///
/// Cheap to clone; clones share the task table.
#[derive(Clone)]
pub struct RecomputeScheduler {
    inner: Arc<Inner>,
}

impl RecomputeScheduler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Request a recompute for the user after the debounce period
    ///
    /// An already-pending task for the same user is cancelled and
    /// replaced; other users are untouched.
    pub fn trigger(&self, user_id: &str) {
        let cancel = Arc::new(AtomicBool::new(false));
        let debounce = self.inner.orchestrator.config().scheduler.debounce();

        let inner = Arc::clone(&self.inner);
        let user = user_id.to_string();
        let flag = Arc::clone(&cancel);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if flag.load(Ordering::Relaxed) {
                return;
            }
            if let Err(e) = inner.run_sweep(&user, &flag).await {
                warn!("[SCHED] sweep for {} failed: {:#}", user, e);
            }
        });

        let mut tasks = self.inner.tasks.lock().unwrap();
        if let Some(previous) = tasks.insert(user_id.to_string(), UserTask { cancel, handle }) {
            previous.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Cancel any pending or running sweep for the user
    ///
    /// A running sweep stops at its next batch boundary.
    pub fn cancel_user(&self, user_id: &str) {
        if let Some(task) = self.inner.tasks.lock().unwrap().remove(user_id) {
            task.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Cancel everything; used at application teardown
    pub fn shutdown(&self) {
        let mut tasks = self.inner.tasks.lock().unwrap();
        for (_, task) in tasks.drain() {
            task.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Is a sweep pending or running for the user?
    pub fn is_scheduled(&self, user_id: &str) -> bool {
        self.inner
            .tasks
            .lock()
            .unwrap()
            .get(user_id)
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the user's current task to finish; test and teardown aid
    pub async fn wait_for(&self, user_id: &str) {
        let handle = {
            let mut tasks = self.inner.tasks.lock().unwrap();
            tasks.remove(user_id).map(|t| t.handle)
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Inner {
    async fn run_sweep(&self, user_id: &str, cancel: &AtomicBool) -> Result<()> {
        let cache_cfg = &self.orchestrator.config().cache;
        let batch_size = self.orchestrator.config().scheduler.batch_size.max(1);
        let now = Utc::now();

        // Housekeeping before any new work
        let swept = self
            .orchestrator
            .correlation_cache()
            .evict_computed_before(now - cache_cfg.stale_sweep());
        if swept > 0 {
            info!("[SCHED] swept {} stale entries", swept);
        }

        if self
            .orchestrator
            .correlation_cache()
            .has_fresh_for_user(user_id, cache_cfg.fresh_skip())
        {
            info!("[SCHED] fresh results exist for {}, skipping sweep", user_id);
            return Ok(());
        }

        let mut computed = 0usize;
        for days in SWEEP_RANGES_DAYS {
            let range = DateRange::trailing_days(now, days);
            let pairs = self.orchestrator.active_pairs(user_id, &range).await?;

            for batch in pairs.chunks(batch_size) {
                if cancel.load(Ordering::Relaxed) {
                    info!(
                        "[SCHED] sweep for {} cancelled after {} pairs",
                        user_id, computed
                    );
                    return Ok(());
                }

                for (cause, effect) in batch {
                    self.orchestrator
                        .compute_and_cache(user_id, cause, effect, &range)
                        .await?;
                    self.orchestrator
                        .discover_rank_correlation(user_id, cause, effect, &range)
                        .await?;
                    computed += 1;
                }

                // Stay cooperative between batches
                tokio::task::yield_now().await;
            }
        }

        info!(
            "[SCHED] sweep for {} finished: {} pair/range computations",
            user_id, computed
        );
        Ok(())
    }
}
