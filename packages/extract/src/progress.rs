//! Progress reporting for the record scan.
//!
//! The extractor only knows about [`ProgressCallback`]; the CLI plugs in an
//! `indicatif` bar and tests use [`null_progress`].

use std::sync::Arc;

/// Receives progress updates while records are being scanned.
pub trait ProgressCallback: Send + Sync {
    /// Advance progress by `delta` records.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
