//! Progress-callback trait for scheduler events.
//!
//! Inject an [`Arc<dyn ProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress`] to receive events as
//! each round (transcription, then translation) runs.
//!
//! Events are informational only: nothing a callback does can change result
//! ordering or content.
//!
//! # Example
//!
//! ```rust
//! use pdflatte::{JobKind, JobResult, PipelineConfig, ProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ProgressCallback for Printer {
//!     fn on_job_finished(&self, _kind: JobKind, result: &JobResult, completed: usize, total: usize) {
//!         eprintln!("{completed}/{total} done (page {})", result.index + 1);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{JobKind, JobResult};
use std::sync::Arc;

/// Called by the scheduler as it runs a round.
///
/// Implementations must be `Send + Sync`. All methods have no-op defaults.
///
/// # Thread safety
///
/// With more than one worker, `on_job_started` and `on_job_finished` for
/// different jobs interleave. The `completed` count passed to
/// `on_job_finished` still increases by exactly one per call.
pub trait ProgressCallback: Send + Sync {
    /// Called once before any job of the round is started.
    fn on_round_start(&self, kind: JobKind, total: usize) {
        let _ = (kind, total);
    }

    /// Called just before a job's remote call is made.
    ///
    /// `index` is the job's page index (0-based).
    fn on_job_started(&self, kind: JobKind, index: usize, total: usize) {
        let _ = (kind, index, total);
    }

    /// Called when a job finished, successfully or not.
    ///
    /// `completed` runs from 1 to `total` across the round.
    fn on_job_finished(&self, kind: JobKind, result: &JobResult, completed: usize, total: usize) {
        let _ = (kind, result, completed, total);
    }

    /// Called once after every job of the round has finished.
    fn on_round_complete(&self, kind: JobKind, total: usize, succeeded: usize) {
        let _ = (kind, total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressHandle = Arc<dyn ProgressCallback>;
