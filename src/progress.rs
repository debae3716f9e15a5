//! Progress reporting seam.
//!
//! Implementations render notifications, progress bars, or UI state; the core
//! treats every call as fire-and-forget and never blocks on the consumer.

/// Receives progress notifications from the collector and the queue manager.
///
/// Methods must return quickly; heavy consumers should hand the values off to
/// their own channel/task.
pub trait ProgressSink: Send + Sync {
    /// Per-job transfer progress, 0..=100.
    fn update(&self, job_id: &str, percent: u8);

    /// A job finished successfully.
    fn complete(&self, job_id: &str, storage_ref: &str, byte_size: u64);

    /// A job failed terminally for this attempt.
    fn fail(&self, job_id: &str, error: &str);

    /// Cumulative per-kind totals after each processed collection page.
    fn collection_progress(&self, photo_count: usize, video_count: usize);
}

/// A sink that discards everything. Useful for tests and headless wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn update(&self, _job_id: &str, _percent: u8) {}

    fn complete(&self, _job_id: &str, _storage_ref: &str, _byte_size: u64) {}

    fn fail(&self, _job_id: &str, _error: &str) {}

    fn collection_progress(&self, _photo_count: usize, _video_count: usize) {}
}
