//! Pipeline error types.

use thiserror::Error;

/// Errors returned by [`PipelineHandle::submit`](super::PipelineHandle::submit).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline is shutting down and accepts no more work.
    #[error("pipeline closed")]
    Closed,
}
