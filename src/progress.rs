//! Progress-callback trait for batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to be told about
//! each file as the batch loop reaches it. The callback is a passive observer:
//! nothing it does can change which files succeed or fail.
//!
//! # Example
//!
//! ```rust
//! use mistral_ocr::{BatchProgressCallback, OcrConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, _input: &Path, output: &Path) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} → {}", index + 1, total, output.display());
//!     }
//! }
//!
//! let config = OcrConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch loop as it processes each file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 0-based in the sorted list of matched
/// files. With `batch_concurrency > 1` the per-file methods may be called
/// out of order, so implementations must be `Send + Sync`.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after the input directory was listed.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is submitted to the OCR endpoint.
    fn on_file_start(&self, index: usize, total_files: usize, input: &Path) {
        let _ = (index, total_files, input);
    }

    /// Called when a file's markdown has been written.
    fn on_file_complete(&self, index: usize, total_files: usize, input: &Path, output: &Path) {
        let _ = (index, total_files, input, output);
    }

    /// Called when a file failed; the batch continues.
    fn on_file_error(&self, index: usize, total_files: usize, input: &Path, error: &str) {
        let _ = (index, total_files, input, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
