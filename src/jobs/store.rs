//! SQLite-backed persistence for download jobs.

use sqlx::Row;
use tokio::sync::watch;
use tracing::{instrument, warn};

use super::error::StoreError;
use super::record::{DownloadJob, JobStatus};
use super::Result;
use crate::db::Database;

/// Returns `Ok(())` if at least one row was affected; otherwise [`StoreError::JobNotFound`].
fn check_affected(id: &str, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(StoreError::JobNotFound(id.to_string()))
    } else {
        Ok(())
    }
}

/// Persisted job records plus a push-based change stream.
///
/// All status transitions are upserts keyed by `id`. Every mutation
/// republishes the full job list through a `watch` channel so consumers can
/// observe status changes without polling the store.
#[derive(Debug, Clone)]
pub struct JobStore {
    db: Database,
    changes: std::sync::Arc<watch::Sender<Vec<DownloadJob>>>,
}

impl JobStore {
    /// Creates a job store over the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        let (changes, _rx) = watch::channel(Vec::new());
        Self {
            db,
            changes: std::sync::Arc::new(changes),
        }
    }

    /// Subscribes to the change stream.
    ///
    /// The receiver holds the job list as of the last mutation; fresh
    /// subscribers see an empty snapshot until something changes.
    #[must_use]
    pub fn observe_all(&self) -> watch::Receiver<Vec<DownloadJob>> {
        self.changes.subscribe()
    }

    /// Inserts or atomically replaces the row with the job's `id`.
    ///
    /// A blank `created_at` on the job resolves to the current time, so
    /// freshly built and retry-reset jobs are stamped on write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    #[instrument(skip(self, job), fields(id = %job.id, status = %job.status()))]
    pub async fn upsert(&self, job: &DownloadJob) -> Result<()> {
        sqlx::query(
            r"INSERT OR REPLACE INTO jobs (
                id, platform, owner_id, owner_label, source_url, file_name,
                media_kind, mime_type, byte_size, status, storage_ref,
                error_message, created_at, completed_at
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                      COALESCE(NULLIF(?, ''), datetime('now')), ?)",
        )
        .bind(&job.id)
        .bind(&job.platform_str)
        .bind(&job.owner_id)
        .bind(&job.owner_label)
        .bind(&job.source_url)
        .bind(&job.file_name)
        .bind(&job.media_kind_str)
        .bind(&job.mime_type)
        .bind(job.byte_size)
        .bind(&job.status_str)
        .bind(&job.storage_ref)
        .bind(&job.error_message)
        .bind(&job.created_at)
        .bind(&job.completed_at)
        .execute(self.db.pool())
        .await?;

        self.publish().await;
        Ok(())
    }

    /// Gets a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<DownloadJob>> {
        let job = sqlx::query_as::<_, DownloadJob>(r"SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(job)
    }

    /// Returns the oldest Pending job, if any (FIFO admission order).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn next_pending(&self) -> Result<Option<DownloadJob>> {
        let job = sqlx::query_as::<_, DownloadJob>(
            r"SELECT * FROM jobs
              WHERE status = ?
              ORDER BY created_at ASC, rowid ASC
              LIMIT 1",
        )
        .bind(JobStatus::Pending.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(job)
    }

    /// Atomically claims a Pending job for execution.
    ///
    /// The guarded `Pending -> Downloading` transition: the update only
    /// applies when the persisted status is still Pending, so a job already
    /// Downloading (or deleted) is never claimed twice. Returns the claimed
    /// row, or `None` when the guard refused.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn claim(&self, id: &str) -> Result<Option<DownloadJob>> {
        let job = sqlx::query_as::<_, DownloadJob>(
            r"UPDATE jobs
              SET status = ?
              WHERE id = ? AND status = ?
              RETURNING *",
        )
        .bind(JobStatus::Downloading.as_str())
        .bind(id)
        .bind(JobStatus::Pending.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        if job.is_some() {
            self.publish().await;
        }
        Ok(job)
    }

    /// Marks a job Completed with its storage reference and final size.
    ///
    /// Sets `completed_at` and clears any stale `error_message`, keeping the
    /// storage_ref/error_message exclusivity invariant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::JobNotFound`] if no job exists with the given id.
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self, storage_ref))]
    pub async fn mark_completed(&self, id: &str, storage_ref: &str, byte_size: i64) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE jobs
              SET status = ?,
                  storage_ref = ?,
                  byte_size = ?,
                  error_message = NULL,
                  completed_at = datetime('now')
              WHERE id = ?",
        )
        .bind(JobStatus::Completed.as_str())
        .bind(storage_ref)
        .bind(byte_size)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_affected(id, result.rows_affected())?;
        self.publish().await;
        Ok(())
    }

    /// Marks a job Failed with an error message.
    ///
    /// Clears `storage_ref` and `completed_at`; failure is terminal for the
    /// attempt and only an explicit retry resets it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::JobNotFound`] if no job exists with the given id.
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self), fields(error = %error))]
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE jobs
              SET status = ?,
                  error_message = ?,
                  storage_ref = NULL,
                  completed_at = NULL
              WHERE id = ?",
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_affected(id, result.rows_affected())?;
        self.publish().await;
        Ok(())
    }

    /// Returns a Downloading job to Pending (explicit pause).
    ///
    /// Guarded like [`claim`](Self::claim): a job that already reached a
    /// terminal state is left untouched. Returns whether a transition
    /// happened.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_pending_if_downloading(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r"UPDATE jobs
              SET status = ?
              WHERE id = ? AND status = ?",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(id)
        .bind(JobStatus::Downloading.as_str())
        .execute(self.db.pool())
        .await?;

        let transitioned = result.rows_affected() > 0;
        if transitioned {
            self.publish().await;
        }
        Ok(transitioned)
    }

    /// Counts jobs by status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let result = sqlx::query(r"SELECT COUNT(*) as count FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(self.db.pool())
            .await?;

        Ok(result.get("count"))
    }

    /// Lists jobs filtered by status, in admission order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_by_status(&self, status: JobStatus) -> Result<Vec<DownloadJob>> {
        let jobs = sqlx::query_as::<_, DownloadJob>(
            r"SELECT * FROM jobs
              WHERE status = ?
              ORDER BY created_at ASC, rowid ASC",
        )
        .bind(status.as_str())
        .fetch_all(self.db.pool())
        .await?;

        Ok(jobs)
    }

    /// Lists all jobs in admission order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<DownloadJob>> {
        let jobs = sqlx::query_as::<_, DownloadJob>(
            r"SELECT * FROM jobs ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(jobs)
    }

    /// Deletes a job row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::JobNotFound`] if no job exists with the given id.
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query(r"DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        check_affected(id, result.rows_affected())?;
        self.publish().await;
        Ok(())
    }

    /// Resets all Downloading jobs back to Pending.
    ///
    /// Called at startup for crash recovery: rows left Downloading by a
    /// previous session return to the queue for rescheduling.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn reset_downloading(&self) -> Result<u64> {
        let result = sqlx::query(
            r"UPDATE jobs
              SET status = ?
              WHERE status = ?",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::Downloading.as_str())
        .execute(self.db.pool())
        .await?;

        let reset = result.rows_affected();
        if reset > 0 {
            self.publish().await;
        }
        Ok(reset)
    }

    /// Republishes the full job list to observers. Best-effort: a failing
    /// snapshot read is logged, never surfaced to the mutating caller.
    async fn publish(&self) {
        match self.list_all().await {
            Ok(jobs) => {
                let _ = self.changes.send_replace(jobs);
            }
            Err(error) => {
                warn!(error = %error, "failed to snapshot jobs for change stream");
            }
        }
    }
}
