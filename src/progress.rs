//! Progress-callback trait for batch and per-page OCR events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the batch walks documents and pages. The CLI drives its
//! progress bar from these; the web front end leaves them unset.
//!
//! # Example
//!
//! ```rust
//! use scan_ocr::{BatchProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     accepted: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, _document: &str, page_num: usize, total_pages: usize, text_len: usize) {
//!         self.accepted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}/{total_pages}: {text_len} chars");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { accepted: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch runner and the document pipeline.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the page
/// events arrive from several worker tasks at once. All methods have default
/// no-op implementations.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after the input folder has been listed.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called once a document has been rasterised.
    ///
    /// # Arguments
    /// * `document`   : file name of the source PDF
    /// * `total_pages`: pages produced by the rasteriser (0 when unreadable)
    fn on_document_start(&self, document: &str, total_pages: usize) {
        let _ = (document, total_pages);
    }

    /// Called when a page passed the quality gate and its artifacts were written.
    /// `text_len` counts characters, not bytes.
    fn on_page_complete(&self, document: &str, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (document, page_num, total_pages, text_len);
    }

    /// Called when a page produced no artifacts.
    ///
    /// `reason` is the display form of the [`crate::error::PageError`].
    fn on_page_skipped(&self, document: &str, page_num: usize, total_pages: usize, reason: &str) {
        let _ = (document, page_num, total_pages, reason);
    }

    /// Called once a document has finished, successfully or not.
    fn on_document_complete(&self, document: &str, success: bool) {
        let _ = (document, success);
    }

    /// Called after every document has been attempted.
    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        let _ = (total_documents, succeeded);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        documents: AtomicUsize,
        accepted: AtomicUsize,
        skipped: Mutex<Vec<String>>,
        succeeded: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_documents: usize) {
            self.documents.store(total_documents, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _document: &str, _page: usize, _total: usize, _len: usize) {
            self.accepted.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_skipped(&self, document: &str, page: usize, _total: usize, _reason: &str) {
            self.skipped.lock().unwrap().push(format!("{document}#{page}"));
        }

        fn on_batch_complete(&self, _total: usize, succeeded: usize) {
            self.succeeded.store(succeeded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start("a.pdf", 3);
        cb.on_page_complete("a.pdf", 1, 3, 42);
        cb.on_page_skipped("a.pdf", 2, 3, "low quality");
        cb.on_document_complete("a.pdf", true);
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(2);
        tracker.on_document_start("a.pdf", 2);
        tracker.on_page_complete("a.pdf", 1, 2, 100);
        tracker.on_page_skipped("a.pdf", 2, 2, "blank");
        tracker.on_document_start("b.pdf", 0);
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.documents.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.accepted.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.skipped.lock().unwrap(), vec!["a.pdf#2".to_string()]);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_page_complete("x.pdf", 1, 10, 512);
    }
}
