//! Progress-callback trait for per-document events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as the batch walks the directory. The CLI uses it to drive its
//! progress bar; library callers can forward events anywhere they like.
//!
//! # Example
//!
//! ```rust
//! use pdf2xlsx::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, file: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}/{total} {file} done");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch orchestrator as it processes each document.
///
/// All methods default to no-ops so callers only override what they need.
/// Indices are 1-based.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once, after listing, before the first document.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before text extraction for a document.
    fn on_document_start(&self, index: usize, total: usize, file: &str) {
        let _ = (index, total, file);
    }

    /// Called when a record was extracted.
    fn on_document_complete(&self, index: usize, total: usize, file: &str) {
        let _ = (index, total, file);
    }

    /// Called when a document yielded no text and was skipped without a model call.
    fn on_document_skipped(&self, index: usize, total: usize, file: &str) {
        let _ = (index, total, file);
    }

    /// Called when the model step failed for good.
    fn on_document_error(&self, index: usize, total: usize, file: &str, error: &str) {
        let _ = (index, total, file, error);
    }

    /// Called while the pipeline sleeps for a cooldown or pacing pause.
    fn on_pause(&self, seconds: u64, reason: &str) {
        let _ = (seconds, reason);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;
