use chrono::Utc;
use morph_storage::{AssetStore, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::interval;

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

struct ScheduledDeletion {
    generation: u64,
    handle: AbortHandle,
}

/// Outcome of one pass over the expiry ledger
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapSummary {
    pub expired: usize,
    pub rearmed: usize,
}

/// Process-wide owner of pending asset deletions.
///
/// Each stored asset gets one timer task; scheduling a name again replaces its timer. The
/// table is bounded: past `max_pending` timers new assets are left to the periodic sweeper,
/// which works from the store's expiry ledger and therefore also covers restarts.
pub struct ExpiryScheduler {
    store: Arc<dyn AssetStore>,
    tasks: Mutex<HashMap<String, ScheduledDeletion>>,
    next_generation: AtomicU64,
    max_pending: usize,
}

impl ExpiryScheduler {
    pub fn new(store: Arc<dyn AssetStore>, max_pending: usize) -> Self {
        Self {
            store,
            tasks: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            max_pending,
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, ScheduledDeletion>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arm a timer that expires `file_name` after `delay`, replacing any earlier timer for it.
    ///
    /// Returns false when the table is full; the sweeper will reap the asset instead.
    pub fn schedule_delete(self: &Arc<Self>, file_name: &str, delay: Duration) -> bool {
        let mut tasks = self.tasks();

        if let Some(previous) = tasks.remove(file_name) {
            previous.handle.abort();
            tracing::debug!(file_name = %file_name, "Replaced pending deletion");
        }

        if tasks.len() >= self.max_pending {
            tracing::warn!(
                file_name = %file_name,
                max_pending = self.max_pending,
                "Deletion table full, leaving asset to the sweeper"
            );
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::clone(self);
        let name = file_name.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.release(&name, generation);
            scheduler.expire_if_due(&name).await;
        });

        tasks.insert(
            file_name.to_string(),
            ScheduledDeletion {
                generation,
                handle: handle.abort_handle(),
            },
        );

        tracing::debug!(
            file_name = %file_name,
            delay_secs = delay.as_secs(),
            pending = tasks.len(),
            "Deletion scheduled"
        );
        true
    }

    /// Drop the table entry of a timer that has fired, unless it was replaced meanwhile.
    fn release(&self, file_name: &str, generation: u64) {
        let mut tasks = self.tasks();
        if tasks
            .get(file_name)
            .is_some_and(|entry| entry.generation == generation)
        {
            tasks.remove(file_name);
        }
    }

    /// Disarm the timer for `file_name`. The asset and its ledger entry are left alone.
    pub fn cancel(&self, file_name: &str) -> bool {
        match self.tasks().remove(file_name) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.tasks().len()
    }

    /// The deletion action. Never fails: an already-gone asset is the desired end state and
    /// other errors are logged.
    pub async fn expire(&self, file_name: &str) {
        match self.store.delete(file_name).await {
            Ok(()) => tracing::info!(file_name = %file_name, "Asset expired"),
            Err(e) => tracing::error!(file_name = %file_name, error = %e, "Failed to expire asset"),
        }
    }

    /// Expire unless the ledger shows a later expiry, i.e. the name was stored again after
    /// this timer was armed or the sweep listed it. Returns whether the asset was removed.
    async fn expire_if_due(&self, file_name: &str) -> bool {
        match self.store.delete_if_expired(file_name, Utc::now()).await {
            Ok(true) => {
                tracing::info!(file_name = %file_name, "Asset expired");
                true
            }
            Ok(false) => {
                tracing::debug!(file_name = %file_name, "Asset was stored again, keeping it");
                false
            }
            Err(e) => {
                // The ledger entry survives, so the next sweep retries
                tracing::error!(file_name = %file_name, error = %e, "Failed to expire asset");
                false
            }
        }
    }

    /// Delete every asset whose recorded expiry has passed and arm timers for the rest.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "reap_expired"))]
    pub async fn reap_expired(self: &Arc<Self>) -> Result<ReapSummary, StorageError> {
        let now = Utc::now();
        let mut summary = ReapSummary::default();

        for pending in self.store.pending_expirations().await? {
            if pending.is_due(now) {
                self.cancel(&pending.file_name);
                if self.expire_if_due(&pending.file_name).await {
                    summary.expired += 1;
                }
                continue;
            }

            if self.tasks().contains_key(&pending.file_name) {
                continue;
            }

            let remaining = (pending.expires_at - now).to_std().unwrap_or(Duration::ZERO);
            if self.schedule_delete(&pending.file_name, remaining) {
                summary.rearmed += 1;
            }
        }

        Ok(summary)
    }

    /// Start the periodic sweeper. The first pass runs immediately, which reaps whatever a
    /// previous process left behind.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            // A zero period would panic inside the task
            let mut sweep_interval = interval(period.max(MIN_SWEEP_PERIOD));

            loop {
                sweep_interval.tick().await;

                match self.reap_expired().await {
                    Ok(summary) => tracing::info!(
                        expired = summary.expired,
                        rearmed = summary.rearmed,
                        pending = self.pending_count(),
                        "Expiry sweep completed"
                    ),
                    Err(e) => tracing::error!(error = %e, "Expiry sweep failed"),
                }
            }
        })
    }

    /// Abort all pending timers. Expiry records stay in the ledger for the next start.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks();
        let count = tasks.len();
        for (_, entry) in tasks.drain() {
            entry.handle.abort();
        }
        tracing::info!(aborted = count, "Expiry scheduler stopped");
    }
}
