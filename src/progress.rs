//! Progress-callback trait for per-image fetch events.
//!
//! Pass an [`Arc<dyn FetchProgressCallback>`] to the orchestrator to receive
//! events while the bounded fetcher works through a deck. The CLI uses it to
//! drive a progress bar; the HTTP service runs with [`NoopProgressCallback`].
//!
//! # Example
//!
//! ```rust
//! use slides_export::FetchProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl FetchProgressCallback for Counter {
//!     fn on_image_complete(&self, _index: usize, _total: usize, _bytes: u64) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the bounded fetcher as each image settles.
///
/// Implementations must be `Send + Sync`: fetch tasks run concurrently and
/// the image events arrive from whichever task finished, in completion order.
/// All methods default to no-ops.
pub trait FetchProgressCallback: Send + Sync {
    /// Called once before any request is issued.
    fn on_fetch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when an image was fetched, normalised and stored.
    ///
    /// # Arguments
    /// * `index` — 0-based position in the input URL list
    /// * `total` — number of URLs in the batch
    /// * `bytes` — size of the stored JPEG
    fn on_image_complete(&self, index: usize, total: usize, bytes: u64) {
        let _ = (index, total, bytes);
    }

    /// Called when an image failed. The batch as a whole will fail.
    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every task has been joined.
    fn on_fetch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FetchProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn FetchProgressCallback>;
