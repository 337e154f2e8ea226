//! Progress-callback trait for chunk-level parse events.
//!
//! Inject an [`Arc<dyn ParseProgressCallback>`] via
//! [`crate::config::AuditConfigBuilder::progress_callback`] to receive
//! real-time events as workers process their page ranges. Callers can
//! forward events to a terminal progress bar, a channel, or an upload
//! status record without the library knowing how the host application
//! communicates.

use crate::pipeline::partition::PageRange;
use std::sync::Arc;

/// Called by the parse orchestrator as workers progress.
///
/// Implementations must be `Send + Sync`: chunk events fire concurrently
/// from blocking-pool threads. All methods have default no-op
/// implementations so callers only override what they care about.
/// Shared mutable state inside an implementation needs its own
/// synchronisation (`Mutex`, atomics).
pub trait ParseProgressCallback: Send + Sync {
    /// Called once after the document has been probed and partitioned.
    ///
    /// # Arguments
    /// * `total_pages` — pages in the document
    /// * `chunk_count` — worker ranges that will be dispatched
    fn on_parse_start(&self, total_pages: usize, chunk_count: usize) {
        let _ = (total_pages, chunk_count);
    }

    /// Called by a worker just before it opens its document handle.
    fn on_chunk_start(&self, range: PageRange) {
        let _ = range;
    }

    /// Called when a worker finishes its range.
    ///
    /// # Arguments
    /// * `range`   — the worker's page range
    /// * `records` — employee rows extracted from that range
    fn on_chunk_complete(&self, range: PageRange, records: usize) {
        let _ = (range, records);
    }

    /// Called when a worker's range degrades (open failure or bad pages).
    ///
    /// The parse continues; this mirrors the [`crate::error::ChunkError`]
    /// entries in the final output.
    fn on_chunk_error(&self, range: PageRange, error: String) {
        let _ = (range, error);
    }

    /// Called once after all chunks have been merged.
    fn on_parse_complete(&self, total_pages: usize, records: usize) {
        let _ = (total_pages, records);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopParseCallback;

impl ParseProgressCallback for NoopParseCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::AuditConfig`].
pub type ProgressCallback = Arc<dyn ParseProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        chunk_completes: AtomicUsize,
        chunk_errors: AtomicUsize,
        final_records: AtomicUsize,
    }

    impl ParseProgressCallback for TrackingCallback {
        fn on_chunk_complete(&self, _range: PageRange, _records: usize) {
            self.chunk_completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _range: PageRange, _error: String) {
            self.chunk_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_parse_complete(&self, _total_pages: usize, records: usize) {
            self.final_records.store(records, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopParseCallback;
        cb.on_parse_start(10, 4);
        cb.on_chunk_start(PageRange { start: 0, end: 3 });
        cb.on_chunk_complete(PageRange { start: 0, end: 3 }, 42);
        cb.on_chunk_error(PageRange { start: 3, end: 6 }, "decode error".into());
        cb.on_parse_complete(10, 42);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            chunk_completes: AtomicUsize::new(0),
            chunk_errors: AtomicUsize::new(0),
            final_records: AtomicUsize::new(0),
        };

        tracker.on_parse_start(4, 2);
        tracker.on_chunk_complete(PageRange { start: 0, end: 2 }, 30);
        tracker.on_chunk_error(PageRange { start: 2, end: 4 }, "bad page".into());
        tracker.on_parse_complete(4, 30);

        assert_eq!(tracker.chunk_completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.chunk_errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.final_records.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopParseCallback>();

        let cb: ProgressCallback = Arc::new(NoopParseCallback);
        cb.on_chunk_start(PageRange { start: 0, end: 1 });
    }
}
