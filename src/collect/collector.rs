//! Sequential cursor walker over a paginated listing API.
//!
//! The collector is intentionally single-flight: each page's cursor depends
//! on the previous response, so pages are fetched one at a time with a
//! mandatory, cancellable delay in between. Items and cursors are
//! deduplicated as they arrive, and misbehaving APIs that hand back a
//! previously seen cursor terminate the run cleanly instead of looping.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::fetcher::{FetchError, PageFetcher};
use super::model::{MediaKind, MediaReference};
use crate::cancel::CancelToken;
use crate::progress::ProgressSink;

/// Why a collection run stopped.
///
/// Loop guards are clean termination signals, not errors; only
/// [`StopReason::FetchFailed`] carries a failure, and even then the partial
/// aggregate is returned alongside it.
#[derive(Debug, Clone)]
pub enum StopReason {
    /// The API returned an empty next cursor.
    EndOfFeed,
    /// The API returned the cursor that was just requested.
    SelfLoop,
    /// The API returned a cursor seen earlier in the run.
    CursorCycle,
    /// The cancel token fired.
    Cancelled,
    /// A page fetch failed; the run stops immediately with partial results.
    /// The caller decides whether to retry the whole run.
    FetchFailed(FetchError),
}

impl StopReason {
    /// True when the run ended without a fetch failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !matches!(self, Self::FetchFailed(_))
    }
}

/// Deduplicated result of a collection run.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    /// First non-empty owner label seen across pages.
    pub owner_label: Option<String>,
    /// All accepted items, in discovery order, deduplicated by `source_id`.
    pub items: Vec<MediaReference>,
    /// Running total of photo URLs across accepted items.
    pub photo_count: usize,
    /// Running total of video URLs across accepted items.
    pub video_count: usize,
}

impl AggregateResult {
    fn absorb(&mut self, batch: &[MediaReference]) {
        for item in batch {
            for media in &item.urls {
                match media.kind {
                    MediaKind::Photo => self.photo_count += 1,
                    MediaKind::Video => self.video_count += 1,
                }
            }
        }
        self.items.extend_from_slice(batch);
    }
}

/// Outcome of a collection run: what was gathered, and why it stopped.
#[derive(Debug)]
pub struct CollectOutcome {
    /// The (possibly partial) aggregate.
    pub aggregate: AggregateResult,
    /// Why the run ended.
    pub stop: StopReason,
}

/// Walks a cursor-based listing API page by page.
#[derive(Debug, Clone)]
pub struct PaginatedCollector {
    inter_page_delay: Duration,
}

impl PaginatedCollector {
    /// Creates a collector with the mandatory delay applied between pages.
    #[must_use]
    pub fn new(inter_page_delay: Duration) -> Self {
        Self { inter_page_delay }
    }

    /// Returns the configured inter-page delay.
    #[must_use]
    pub fn inter_page_delay(&self) -> Duration {
        self.inter_page_delay
    }

    /// Drives the fetcher through the listing until a termination condition
    /// is met.
    ///
    /// `on_batch` is invoked with the newly accepted (deduplicated) items of
    /// each page; empty batches are skipped. `progress` receives cumulative
    /// per-kind counts after every processed page. Cancellation is checked at
    /// the top of every iteration and while sleeping between pages.
    #[instrument(skip_all, fields(platform = %fetcher.platform()))]
    pub async fn collect<F>(
        &self,
        fetcher: &dyn PageFetcher,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
        mut on_batch: F,
    ) -> CollectOutcome
    where
        F: FnMut(&[MediaReference]) + Send,
    {
        let mut aggregate = AggregateResult::default();
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut cursor = String::new();

        info!("starting collection run");

        let stop = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let page = match fetcher.fetch(&cursor).await {
                Ok(page) => page,
                Err(error) => {
                    warn!(cursor = %cursor, error = %error, "page fetch failed, returning partial aggregate");
                    break StopReason::FetchFailed(error);
                }
            };

            seen_cursors.insert(cursor.clone());

            if aggregate.owner_label.is_none()
                && let Some(label) = page
                    .owner_label
                    .as_deref()
                    .filter(|label| !label.is_empty())
            {
                aggregate.owner_label = Some(label.to_string());
            }

            let accepted: Vec<MediaReference> = page
                .items
                .into_iter()
                .filter(|item| seen_ids.insert(item.source_id.clone()))
                .collect();

            debug!(
                cursor = %cursor,
                accepted = accepted.len(),
                total = aggregate.items.len() + accepted.len(),
                "processed page"
            );

            aggregate.absorb(&accepted);
            if !accepted.is_empty() {
                on_batch(&accepted);
            }
            progress.collection_progress(aggregate.photo_count, aggregate.video_count);

            // Termination checks, in order: end of feed, self-loop, cycle.
            if page.next_cursor.is_empty() {
                break StopReason::EndOfFeed;
            }
            if page.next_cursor == cursor {
                warn!(cursor = %cursor, "listing API returned its own cursor, stopping");
                break StopReason::SelfLoop;
            }
            if seen_cursors.contains(&page.next_cursor) {
                warn!(cursor = %page.next_cursor, "listing API returned a seen cursor, stopping");
                break StopReason::CursorCycle;
            }

            cursor = page.next_cursor;

            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            tokio::select! {
                () = tokio::time::sleep(self.inter_page_delay) => {}
                () = cancel.cancelled() => break StopReason::Cancelled,
            }
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
        };

        info!(
            items = aggregate.items.len(),
            photos = aggregate.photo_count,
            videos = aggregate.video_count,
            clean = stop.is_clean(),
            "collection run finished"
        );

        CollectOutcome { aggregate, stop }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::collect::model::{MediaUrl, PageResult, Platform};
    use crate::progress::NullProgressSink;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn reference(id: &str) -> MediaReference {
        MediaReference {
            source_id: id.to_string(),
            owner_label: None,
            urls: vec![MediaUrl::new(
                MediaKind::Photo,
                format!("https://example.com/{id}.jpg"),
            )],
            platform: Platform::Twitter,
        }
    }

    /// Replays a scripted sequence of pages keyed by request order.
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
            Platform::Twitter
        }

        async fn fetch(&self, _cursor: &str) -> Result<PageResult, FetchError> {
            let mut pages = self.pages.lock().unwrap();
            assert!(!pages.is_empty(), "fetched past the scripted pages");
            pages.remove(0)
        }
    }

    fn page(ids: &[&str], next_cursor: &str) -> PageResult {
        PageResult {
            items: ids.iter().map(|id| reference(id)).collect(),
            next_cursor: next_cursor.to_string(),
            owner_label: None,
        }
    }

    fn collector() -> PaginatedCollector {
        PaginatedCollector::new(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_empty_first_page_completes_immediately() {
        let fetcher = ScriptedFetcher::new(vec![Ok(page(&[], ""))]);
        let cancel = CancelHandle::new();

        let mut batches = 0usize;
        let outcome = collector()
            .collect(&fetcher, &NullProgressSink, &cancel.token(), |_| {
                batches += 1;
            })
            .await;

        assert!(matches!(outcome.stop, StopReason::EndOfFeed));
        assert!(outcome.aggregate.items.is_empty());
        assert_eq!(batches, 0, "empty batches are skipped");
    }

    #[tokio::test]
    async fn test_duplicate_ids_across_pages_are_filtered() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a", "b"], "p2")),
            Ok(page(&["b", "c"], "")),
        ]);
        let cancel = CancelHandle::new();

        let outcome = collector()
            .collect(&fetcher, &NullProgressSink, &cancel.token(), |_| {})
            .await;

        let ids: Vec<&str> = outcome
            .aggregate
            .items
            .iter()
            .map(|item| item.source_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_self_loop_cursor_terminates_after_page() {
        // Second page replays its own requested cursor.
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a"], "p2")),
            Ok(page(&["b"], "p2")),
        ]);
        let cancel = CancelHandle::new();

        let outcome = collector()
            .collect(&fetcher, &NullProgressSink, &cancel.token(), |_| {})
            .await;

        assert!(matches!(outcome.stop, StopReason::SelfLoop));
        assert_eq!(outcome.aggregate.items.len(), 2);
    }

    #[tokio::test]
    async fn test_cursor_cycle_terminates_without_reprocessing() {
        // "" -> "A" -> "B" -> "A": each page processed exactly once.
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["1"], "A")),
            Ok(page(&["2"], "B")),
            Ok(page(&["3"], "A")),
        ]);
        let cancel = CancelHandle::new();

        let outcome = collector()
            .collect(&fetcher, &NullProgressSink, &cancel.token(), |_| {})
            .await;

        assert!(matches!(outcome.stop, StopReason::CursorCycle));
        assert_eq!(outcome.aggregate.items.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_error_returns_partial_aggregate() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a", "b"], "p2")),
            Err(FetchError::transport("p2", "connection reset")),
        ]);
        let cancel = CancelHandle::new();

        let outcome = collector()
            .collect(&fetcher, &NullProgressSink, &cancel.token(), |_| {})
            .await;

        assert!(matches!(outcome.stop, StopReason::FetchFailed(_)));
        assert!(!outcome.stop.is_clean());
        assert_eq!(outcome.aggregate.items.len(), 2);
    }

    #[tokio::test]
    async fn test_first_non_empty_owner_label_wins() {
        let mut first = page(&["a"], "p2");
        first.owner_label = Some(String::new());
        let mut second = page(&["b"], "p3");
        second.owner_label = Some("alice".to_string());
        let mut third = page(&["c"], "");
        third.owner_label = Some("bob".to_string());

        let fetcher = ScriptedFetcher::new(vec![Ok(first), Ok(second), Ok(third)]);
        let cancel = CancelHandle::new();

        let outcome = collector()
            .collect(&fetcher, &NullProgressSink, &cancel.token(), |_| {})
            .await;

        assert_eq!(outcome.aggregate.owner_label.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_stops_before_fetching() {
        let fetcher = ScriptedFetcher::new(vec![Ok(page(&["a"], ""))]);
        let cancel = CancelHandle::new();
        cancel.cancel();

        let outcome = collector()
            .collect(&fetcher, &NullProgressSink, &cancel.token(), |_| {})
            .await;

        assert!(matches!(outcome.stop, StopReason::Cancelled));
        assert!(outcome.aggregate.items.is_empty());
    }
}
