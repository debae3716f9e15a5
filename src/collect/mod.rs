//! Paginated collection engine.
//!
//! Walks a cursor-based remote listing API one page at a time, deduplicates
//! items and pages, respects a mandatory inter-page delay, tolerates partial
//! failure, and reports incremental progress.
//!
//! # Overview
//!
//! - [`PageFetcher`] - per-platform listing capability, supplied externally
//! - [`PaginatedCollector`] - the sequential cursor walker
//! - [`MediaReference`] / [`PageResult`] - the data model
//! - [`CollectOutcome`] / [`StopReason`] - how runs end
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use mediagrab::collect::PaginatedCollector;
//! use mediagrab::{CancelHandle, NullProgressSink};
//!
//! let collector = PaginatedCollector::new(Duration::from_secs(2));
//! let cancel = CancelHandle::new();
//! let outcome = collector
//!     .collect(&fetcher, &NullProgressSink, &cancel.token(), |batch| {
//!         println!("accepted {} new items", batch.len());
//!     })
//!     .await;
//! ```

mod collector;
mod fetcher;
mod model;

pub use collector::{AggregateResult, CollectOutcome, PaginatedCollector, StopReason};
pub use fetcher::{FetchError, PageFetcher};
pub use model::{MediaKind, MediaReference, MediaUrl, PageResult, Platform};
