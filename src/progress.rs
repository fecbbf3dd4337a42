//! Progress-callback trait for batch extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as [`crate::extract_batch`] works through its documents.
//!
//! # Example
//!
//! ```rust
//! use edgequake_invoice::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, item_count: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Document {}/{}: {} items", index + 1, total, item_count);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by batch extraction as it processes each document.
///
/// Implementations must be `Send + Sync`: documents run concurrently, so the
/// per-document methods may be called from several tasks at once. All methods
/// default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any document is fetched.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a document is fetched.
    ///
    /// `index` is 0-based in input order.
    fn on_document_start(&self, index: usize, total: usize, location: &str) {
        let _ = (index, total, location);
    }

    /// Called when a document produced a success envelope.
    fn on_document_complete(&self, index: usize, total: usize, item_count: usize) {
        let _ = (index, total, item_count);
    }

    /// Called when a document produced a failure envelope.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
