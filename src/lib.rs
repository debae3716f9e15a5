//! mediagrab: paginated media collection and a persisted download queue.
//!
//! Two subsystems cooperate here. The collection engine
//! ([`collect`]) walks a platform's paginated feed through a
//! [`PageFetcher`](collect::PageFetcher), deduplicating items and guarding
//! against cursor cycles, and aggregates media references incrementally. The
//! job queue ([`jobs`]) turns those references into persisted download jobs
//! and executes them under a concurrency-bounded scheduler with explicit
//! pause, retry, and cancel operations.
//!
//! Network and filesystem access stay behind traits
//! ([`PageFetcher`](collect::PageFetcher), [`StorageSink`](storage::StorageSink),
//! [`PreflightChecker`](preflight::PreflightChecker)); this crate owns the
//! orchestration and persistence.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod collect;
pub mod config;
pub mod db;
pub mod filename;
pub mod jobs;
pub mod logging;
pub mod preflight;
pub mod progress;
pub mod storage;

pub use cancel::{CancelHandle, CancelToken};
pub use collect::{MediaKind, MediaReference, PaginatedCollector, Platform};
pub use config::Settings;
pub use db::Database;
pub use jobs::{DownloadJob, DownloadQueueManager, JobStatus, JobStore};
pub use progress::{NullProgressSink, ProgressSink};
