//! Error types for summary operations.

use thiserror::Error;

/// Errors that can occur while building a summary.
#[derive(Error, Debug)]
pub enum QuadsumError {
    /// The node arena ran out of slots before every split completed.
    ///
    /// The run is aborted; `max_depth` (or the configured node capacity) is too
    /// small for the point distribution.
    #[error("node arena exhausted: {requested} slots needed, capacity is {capacity}")]
    CapacityExceeded { capacity: usize, requested: usize },

    /// The run was rejected before any parallel work was dispatched.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// The worker pool could not be created.
    #[error("worker pool creation failed: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl QuadsumError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
