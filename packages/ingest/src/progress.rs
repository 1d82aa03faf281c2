//! Progress reporting for long-running pipeline stages.
//!
//! Stages report through [`ProgressCallback`] so that libraries stay
//! independent of how progress is rendered. The `indicatif` implementation
//! lives in `crime_forecast_cli_utils`.

use std::sync::Arc;

/// Receives progress updates from a running stage.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// [`Arc`].
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (bytes, rows, steps).
    fn set_total(&self, total: u64);

    /// Set the current position (absolute, not delta).
    fn set_position(&self, pos: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] for callers that do not render
/// progress (tests, the server).
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
