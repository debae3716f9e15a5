//! Persisted download job queue.
//!
//! A job is one media URL to transfer: discovered by the collection engine,
//! admitted through preflight checks, persisted immediately, and executed
//! under a bounded worker pool. The queue survives restarts; rows caught
//! mid-transfer by a crash return to Pending at startup.
//!
//! - [`record`]: the persisted job row and its status state machine
//! - [`store`]: `SQLite` persistence plus a push-based change stream
//! - [`manager`]: admission control, scheduling, and lifecycle operations
//! - [`error`]: store error taxonomy with typed database classification

pub mod error;
pub mod manager;
pub mod record;
pub mod store;

pub use error::{DbErrorKind, StoreError};
pub use manager::{DownloadQueueManager, ManagerError, SchedulerGuard};
pub use record::{DownloadJob, JobStatus};
pub use store::JobStore;

/// Convenience alias for store operation results.
pub type Result<T> = std::result::Result<T, StoreError>;
