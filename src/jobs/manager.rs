//! Concurrency-bounded scheduler for persisted download jobs.
//!
//! The manager admits jobs through preflight checks, persists them as
//! Pending, and executes them under a semaphore-bounded worker pool. Job
//! rows move through an explicit state machine
//! (`Pending -> Downloading -> {Completed, Failed}`) with explicit pause,
//! retry, and cancel edges; nothing is ever retried automatically.
//!
//! # Concurrency Model
//!
//! - Each transfer runs in its own Tokio task holding an owned semaphore
//!   permit; permits release on drop (RAII), so a slot frees no matter how
//!   the worker exits
//! - The scheduler claims jobs through the store's guarded
//!   `Pending -> Downloading` compare-and-swap, so a job is never started
//!   twice even if an enqueue races a resume
//! - Claiming and worker registration happen under the active-transfer
//!   lock; pause/cancel/retry take the same lock, so they either find the
//!   live worker and join it, or act on the persisted row alone

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::record::{DownloadJob, JobStatus};
use super::store::JobStore;
use crate::cancel::{CancelHandle, CancelToken};
use crate::config::{Settings, SettingsError};
use crate::jobs::StoreError;
use crate::preflight::{PreflightChecker, PreflightError};
use crate::progress::ProgressSink;
use crate::storage::{StorageError, StorageSink};

/// Error type for queue manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Admission control refused the job; no row was created.
    #[error("admission rejected: {0}")]
    Admission(#[from] PreflightError),

    /// Job store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration is outside its documented ranges.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
}

/// A live worker: its cancel signal and task handle.
struct ActiveTransfer {
    cancel: CancelHandle,
    join: JoinHandle<()>,
}

struct Inner {
    store: JobStore,
    preflight: Arc<dyn PreflightChecker>,
    storage: Arc<dyn StorageSink>,
    progress: Arc<dyn ProgressSink>,
    wifi_only: bool,
    semaphore: Arc<Semaphore>,
    wake: Notify,
    active: Mutex<HashMap<String, ActiveTransfer>>,
    running: AtomicUsize,
}

/// Handle for a spawned scheduler loop.
pub struct SchedulerGuard {
    cancel: CancelHandle,
    join: JoinHandle<()>,
}

impl SchedulerGuard {
    /// Stops the scheduler loop and waits for it to exit.
    ///
    /// In-flight transfers are not interrupted; they finish (or are paused/
    /// cancelled individually) and release their slots as usual.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(error) = self.join.await {
            warn!(error = %error, "scheduler task panicked");
        }
    }
}

/// Admission control, bounded scheduling, and lifecycle operations for
/// download jobs.
#[derive(Clone)]
pub struct DownloadQueueManager {
    inner: Arc<Inner>,
}

impl DownloadQueueManager {
    /// Creates a manager over the given store and collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Settings`] when the configuration is outside
    /// its documented ranges (concurrency must be 1..=10).
    pub fn new(
        store: JobStore,
        preflight: Arc<dyn PreflightChecker>,
        storage: Arc<dyn StorageSink>,
        progress: Arc<dyn ProgressSink>,
        settings: &Settings,
    ) -> Result<Self, ManagerError> {
        settings.validate()?;
        let max_concurrent = usize::from(settings.max_concurrent_downloads);

        debug!(max_concurrent, wifi_only = settings.wifi_only, "creating queue manager");

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                preflight,
                storage,
                progress,
                wifi_only: settings.wifi_only,
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                wake: Notify::new(),
                active: Mutex::new(HashMap::new()),
                running: AtomicUsize::new(0),
            }),
        })
    }

    /// Number of transfers currently executing.
    #[must_use]
    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Returns the underlying job store (for observation/queries).
    #[must_use]
    pub fn store(&self) -> &JobStore {
        &self.inner.store
    }

    /// Startup crash recovery: returns rows left Downloading by a previous
    /// session to Pending and wakes the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Store`] if the reset fails.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<u64, ManagerError> {
        let reset = self.inner.store.reset_downloading().await?;
        if reset > 0 {
            info!(reset, "recovered interrupted jobs from previous session");
            self.inner.wake.notify_one();
        }
        Ok(reset)
    }

    /// Admits a job and persists it as Pending.
    ///
    /// Admission checks run first: network availability (honoring the
    /// wifi-only policy) and platform credentials. A rejected job never
    /// creates a row. On success the row is upserted with a normalized
    /// Pending state and the scheduler is woken.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Admission`] when preflight refuses, or
    /// [`ManagerError::Store`] if persistence fails.
    #[instrument(skip(self, job), fields(id = %job.id))]
    pub async fn enqueue(&self, job: DownloadJob) -> Result<(), ManagerError> {
        self.inner.preflight.check_network(self.inner.wifi_only).await?;
        self.inner.preflight.check_login(job.platform()).await?;

        let mut job = job;
        job.status_str = JobStatus::Pending.as_str().to_string();
        job.storage_ref = None;
        job.error_message = None;
        job.completed_at = None;
        job.byte_size = 0;

        self.inner.store.upsert(&job).await?;
        debug!("job admitted");
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Spawns the scheduler loop, returning a guard to shut it down.
    #[must_use]
    pub fn start(&self) -> SchedulerGuard {
        let cancel = CancelHandle::new();
        let token = cancel.token();
        let manager = self.clone();
        let join = tokio::spawn(async move {
            manager.run(token).await;
        });
        SchedulerGuard { cancel, join }
    }

    /// The scheduler loop: while capacity and Pending work exist, claim the
    /// oldest Pending job and dispatch a worker; otherwise park on the wake
    /// signal. Runs until the token fires.
    pub async fn run(&self, cancel: CancelToken) {
        info!("queue scheduler started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
                permit = self.inner.semaphore.clone().acquire_owned() => {
                    match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    }
                }
                () = cancel.cancelled() => break,
            };

            // Claim and register under the active lock so pause/cancel/retry
            // never observe a claimed-but-untracked job.
            let mut active = self.inner.active.lock().await;
            match self.claim_next().await {
                Some(job) => {
                    let worker_cancel = CancelHandle::new();
                    let token = worker_cancel.token();
                    let job_id = job.id.clone();
                    self.inner.running.fetch_add(1, Ordering::SeqCst);
                    let inner = Arc::clone(&self.inner);
                    let join = tokio::spawn(async move {
                        let _permit = permit;
                        run_transfer(inner, job, token).await;
                    });
                    active.insert(
                        job_id,
                        ActiveTransfer {
                            cancel: worker_cancel,
                            join,
                        },
                    );
                    drop(active);
                }
                None => {
                    drop(active);
                    drop(permit);
                    tokio::select! {
                        () = self.inner.wake.notified() => {}
                        () = cancel.cancelled() => break,
                    }
                }
            }
        }
        info!("queue scheduler stopped");
    }

    /// Explicit pause: stops the in-flight transfer (if any) and returns the
    /// job to Pending, releasing the worker slot.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Store`] with `JobNotFound` when no such row
    /// exists.
    #[instrument(skip(self))]
    pub async fn pause(&self, id: &str) -> Result<(), ManagerError> {
        self.stop_worker(id).await;

        if self.inner.store.get(id).await?.is_none() {
            return Err(StoreError::JobNotFound(id.to_string()).into());
        }
        // Only a Downloading row resets; terminal rows are left untouched.
        let transitioned = self.inner.store.mark_pending_if_downloading(id).await?;
        if transitioned {
            debug!("job paused back to pending");
        }
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Destructive cancel: stops any in-flight transfer, deletes the stored
    /// artifact when one exists, and removes the row.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Store`] with `JobNotFound` when no such row
    /// exists.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str) -> Result<(), ManagerError> {
        self.stop_worker(id).await;

        let Some(job) = self.inner.store.get(id).await? else {
            return Err(StoreError::JobNotFound(id.to_string()).into());
        };

        if let Some(storage_ref) = &job.storage_ref
            && let Err(error) = self.inner.storage.delete(storage_ref).await
        {
            warn!(storage_ref = %storage_ref, error = %error, "failed to delete stored artifact");
        }

        self.inner.store.delete(id).await?;
        info!("job cancelled and removed");
        Ok(())
    }

    /// Explicit retry: rebuilds the row under the same id as a fresh Pending
    /// job with a regenerated file name and cleared completion/error fields.
    ///
    /// Any live worker for the id is stopped first so it cannot overwrite
    /// the reset row.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Store`] with `JobNotFound` when no such row
    /// exists.
    #[instrument(skip(self))]
    pub async fn retry(&self, id: &str) -> Result<(), ManagerError> {
        self.stop_worker(id).await;

        let Some(existing) = self.inner.store.get(id).await? else {
            return Err(StoreError::JobNotFound(id.to_string()).into());
        };

        let reset = existing.reset_for_retry();
        self.inner.store.upsert(&reset).await?;
        debug!("job reset for retry");
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Retries every Failed job. Per-job failures are logged and skipped.
    ///
    /// Returns the number of jobs reset.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Store`] if the Failed set cannot be listed.
    #[instrument(skip(self))]
    pub async fn retry_all(&self) -> Result<usize, ManagerError> {
        let failed = self.inner.store.list_by_status(JobStatus::Failed).await?;
        let mut retried = 0;
        for job in failed {
            match self.retry(&job.id).await {
                Ok(()) => retried += 1,
                Err(error) => warn!(id = %job.id, error = %error, "retry failed, skipping"),
            }
        }
        info!(retried, "bulk retry finished");
        Ok(retried)
    }

    /// Cancels every Pending and Downloading job. Per-job failures are
    /// logged and skipped.
    ///
    /// Returns the number of jobs removed.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Store`] if the active sets cannot be listed.
    #[instrument(skip(self))]
    pub async fn cancel_all(&self) -> Result<usize, ManagerError> {
        let mut targets = self.inner.store.list_by_status(JobStatus::Pending).await?;
        targets.extend(self.inner.store.list_by_status(JobStatus::Downloading).await?);

        let mut cancelled = 0;
        for job in targets {
            match self.cancel(&job.id).await {
                Ok(()) => cancelled += 1,
                Err(error) => warn!(id = %job.id, error = %error, "cancel failed, skipping"),
            }
        }
        info!(cancelled, "bulk cancel finished");
        Ok(cancelled)
    }

    /// Stops and joins the live worker for `id`, if one exists.
    async fn stop_worker(&self, id: &str) -> bool {
        let entry = self.inner.active.lock().await.remove(id);
        match entry {
            Some(transfer) => {
                transfer.cancel.cancel();
                if let Err(error) = transfer.join.await {
                    warn!(id, error = %error, "worker task panicked");
                }
                true
            }
            None => false,
        }
    }

    /// Finds and claims the oldest Pending job.
    ///
    /// Jobs that vanish or flip state between selection and claim are
    /// skipped; store failures are logged and treated as "nothing to do" so
    /// the scheduler parks instead of hot-looping.
    async fn claim_next(&self) -> Option<DownloadJob> {
        loop {
            let candidate = match self.inner.store.next_pending().await {
                Ok(candidate) => candidate?,
                Err(error) => {
                    warn!(error = %error, "failed to select next pending job");
                    return None;
                }
            };
            match self.inner.store.claim(&candidate.id).await {
                Ok(Some(job)) => return Some(job),
                // Guard refused: claimed elsewhere or removed meanwhile.
                Ok(None) => continue,
                Err(error) => {
                    warn!(id = %candidate.id, error = %error, "failed to claim job");
                    return None;
                }
            }
        }
    }
}

/// Executes one claimed transfer to a terminal (or cancelled) end.
async fn run_transfer(inner: Arc<Inner>, job: DownloadJob, cancel: CancelToken) {
    debug!(id = %job.id, url = %job.source_url, "transfer started");

    let outcome = {
        let progress = Arc::clone(&inner.progress);
        let job_id = job.id.clone();
        let mut last_percent: Option<u8> = None;
        let mut on_chunk = move |written: u64, total_hint: Option<u64>| {
            let Some(total) = total_hint.filter(|total| *total > 0) else {
                return;
            };
            let percent =
                u8::try_from(written.saturating_mul(100) / total).unwrap_or(100).min(100);
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                progress.update(&job_id, percent);
            }
        };

        // The sink watches the token itself and must run to completion:
        // its partial-artifact cleanup lives on the path that returns
        // Cancelled, so the future cannot be dropped from outside.
        inner
            .storage
            .stream(&job.source_url, &cancel, &mut on_chunk)
            .await
    };

    match outcome {
        Ok(artifact) => {
            let byte_size = i64::try_from(artifact.byte_size).unwrap_or(i64::MAX);
            info!(id = %job.id, bytes = artifact.byte_size, "transfer completed");
            // Best-effort status update - don't crash if it fails
            if let Err(error) = inner
                .store
                .mark_completed(&job.id, &artifact.storage_ref, byte_size)
                .await
            {
                warn!(id = %job.id, error = %error, "failed to mark job completed");
            }
            inner
                .progress
                .complete(&job.id, &artifact.storage_ref, artifact.byte_size);
        }
        Err(StorageError::Cancelled) => {
            // Pause/cancel own the row after stopping this worker; writing a
            // terminal state here would clobber their reset.
            debug!(id = %job.id, "transfer cancelled");
        }
        Err(error) => {
            warn!(id = %job.id, error = %error, "transfer failed");
            if let Err(store_error) = inner.store.mark_failed(&job.id, &error.to_string()).await {
                warn!(id = %job.id, error = %store_error, "failed to mark job failed");
            }
            inner.progress.fail(&job.id, &error.to_string());
        }
    }

    // Deregister (pause/cancel may have removed the entry already), free the
    // slot, and let the scheduler look for more work.
    inner.active.lock().await.remove(&job.id);
    inner.running.fetch_sub(1, Ordering::SeqCst);
    inner.wake.notify_one();
}
