//! Integration tests for the paginated collection engine.
//!
//! These tests drive full multi-page runs through a scripted fetcher and
//! verify aggregation, dedup, incremental batching, and progress reporting.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mediagrab::cancel::CancelHandle;
use mediagrab::collect::{
    FetchError, MediaKind, MediaReference, MediaUrl, PageFetcher, PageResult, PaginatedCollector,
    Platform, StopReason,
};
use mediagrab::progress::ProgressSink;

/// Replays a scripted sequence of pages in request order.
struct ScriptedFetcher {
    pages: Mutex<Vec<Result<PageResult, FetchError>>>,
}

impl ScriptedFetcher {
    fn new(pages: Vec<Result<PageResult, FetchError>>) -> Self {
        Self {
            pages: Mutex::new(pages),
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    fn platform(&self) -> Platform {
        Platform::Lofter
    }

    async fn fetch(&self, _cursor: &str) -> Result<PageResult, FetchError> {
        let mut pages = self.pages.lock().expect("scripted pages lock poisoned");
        assert!(!pages.is_empty(), "fetched past the scripted pages");
        pages.remove(0)
    }
}

/// Captures every `collection_progress` call for later inspection.
#[derive(Default)]
struct RecordingProgress {
    collection_calls: Mutex<Vec<(usize, usize)>>,
}

impl ProgressSink for RecordingProgress {
    fn update(&self, _job_id: &str, _percent: u8) {}

    fn complete(&self, _job_id: &str, _storage_ref: &str, _byte_size: u64) {}

    fn fail(&self, _job_id: &str, _error: &str) {}

    fn collection_progress(&self, photo_count: usize, video_count: usize) {
        self.collection_calls
            .lock()
            .expect("progress lock poisoned")
            .push((photo_count, video_count));
    }
}

/// One reference with a single photo URL; ids ending in an even digit get a
/// video URL as well.
fn reference(id: usize) -> MediaReference {
    let mut urls = vec![MediaUrl::new(
        MediaKind::Photo,
        format!("https://img.example.com/{id}.jpg"),
    )];
    if id % 2 == 0 {
        urls.push(MediaUrl::new(
            MediaKind::Video,
            format!("https://vid.example.com/{id}.mp4"),
        ));
    }
    MediaReference {
        source_id: id.to_string(),
        owner_label: None,
        urls,
        platform: Platform::Lofter,
    }
}

fn page(ids: impl IntoIterator<Item = usize>, next_cursor: &str) -> PageResult {
    PageResult {
        items: ids.into_iter().map(reference).collect(),
        next_cursor: next_cursor.to_string(),
        owner_label: Some("alice".to_string()),
    }
}

fn collector() -> PaginatedCollector {
    // Real runs space pages out by seconds; tests keep the walk fast.
    PaginatedCollector::new(Duration::from_millis(1))
}

#[tokio::test]
async fn test_three_page_walk_with_overlap_dedupes_and_batches() {
    // 20 + 20 + 5 items, where the last page repeats three ids from the
    // second page. 42 distinct items survive.
    let fetcher = ScriptedFetcher::new(vec![
        Ok(page(0..20, "A")),
        Ok(page(20..40, "B")),
        Ok(page([37, 38, 39, 40, 41], "")),
    ]);
    let progress = RecordingProgress::default();
    let cancel = CancelHandle::new();

    let mut batch_sizes = Vec::new();
    let outcome = collector()
        .collect(&fetcher, &progress, &cancel.token(), |batch| {
            batch_sizes.push(batch.len());
        })
        .await;

    assert!(matches!(outcome.stop, StopReason::EndOfFeed));
    assert!(outcome.stop.is_clean());
    assert_eq!(outcome.aggregate.items.len(), 42);
    assert_eq!(
        batch_sizes,
        vec![20, 20, 2],
        "only newly accepted items reach on_batch"
    );

    // Discovery order is preserved across pages.
    let ids: Vec<usize> = outcome
        .aggregate
        .items
        .iter()
        .map(|item| item.source_id.parse().expect("numeric id"))
        .collect();
    assert_eq!(ids, (0..42).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_progress_counts_are_cumulative_and_monotone() {
    let fetcher = ScriptedFetcher::new(vec![
        Ok(page(0..10, "A")),
        Ok(page(10..20, "B")),
        Ok(page([], "")),
    ]);
    let progress = RecordingProgress::default();
    let cancel = CancelHandle::new();

    let outcome = collector()
        .collect(&fetcher, &progress, &cancel.token(), |_| {})
        .await;

    // Every id gets a photo URL, even ids a video URL too.
    assert_eq!(outcome.aggregate.photo_count, 20);
    assert_eq!(outcome.aggregate.video_count, 10);

    let calls = progress
        .collection_calls
        .lock()
        .expect("progress lock poisoned")
        .clone();
    assert_eq!(calls.len(), 3, "one progress report per processed page");
    assert_eq!(calls[0], (10, 5));
    assert_eq!(calls[1], (20, 10));
    assert_eq!(calls[2], (20, 10), "an empty final page repeats the totals");
    for window in calls.windows(2) {
        assert!(window[1].0 >= window[0].0);
        assert!(window[1].1 >= window[0].1);
    }
}

#[tokio::test]
async fn test_owner_label_comes_from_first_reporting_page() {
    let fetcher = ScriptedFetcher::new(vec![Ok(page(0..3, ""))]);
    let progress = RecordingProgress::default();
    let cancel = CancelHandle::new();

    let outcome = collector()
        .collect(&fetcher, &progress, &cancel.token(), |_| {})
        .await;

    assert_eq!(outcome.aggregate.owner_label.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_cancel_during_walk_keeps_collected_items() {
    let fetcher = ScriptedFetcher::new(vec![
        Ok(page(0..10, "A")),
        Ok(page(10..20, "B")),
        Ok(page(20..30, "")),
    ]);
    let progress = RecordingProgress::default();
    let cancel = CancelHandle::new();
    let token = cancel.token();

    // Cancel as soon as the first batch lands; the walk must stop before
    // fetching another page.
    let outcome = collector()
        .collect(&fetcher, &progress, &token, |_| cancel.cancel())
        .await;

    assert!(matches!(outcome.stop, StopReason::Cancelled));
    assert_eq!(outcome.aggregate.items.len(), 10, "first page is kept");
}

#[tokio::test]
async fn test_fetch_failure_mid_walk_returns_partial_aggregate() {
    let fetcher = ScriptedFetcher::new(vec![
        Ok(page(0..10, "A")),
        Ok(page(10..20, "B")),
        Err(FetchError::parse("B", "unexpected listing payload")),
    ]);
    let progress = RecordingProgress::default();
    let cancel = CancelHandle::new();

    let mut batches = 0usize;
    let outcome = collector()
        .collect(&fetcher, &progress, &cancel.token(), |_| batches += 1)
        .await;

    assert_eq!(batches, 2);
    assert_eq!(outcome.aggregate.items.len(), 20);
    match outcome.stop {
        StopReason::FetchFailed(error) => {
            assert!(error.to_string().contains("unexpected listing payload"));
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
}
