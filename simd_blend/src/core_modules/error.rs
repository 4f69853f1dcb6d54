// THEORY:
// Every kernel either returns a fully written `ResultBuffer` or one of these
// errors. There is no third outcome: a worker that could not be started or that
// died mid-range would leave pixels unwritten, so the whole invocation fails.

use std::io;

use thiserror::Error;

/// Errors produced while validating inputs or running a blend kernel.
#[derive(Debug, Error)]
pub enum BlendError {
    /// The image buffer does not describe a usable `rows x cols` grayscale image.
    #[error("invalid image: {reason}")]
    InvalidImage { reason: String },

    /// The vector kernel was asked to reject widths that do not fill whole lanes.
    #[error("image width {cols} is not a multiple of the {lane}-byte lane width")]
    UnsupportedDimensions { cols: usize, lane: usize },

    #[error("alpha_inversed = {alpha_inversed} is not supported: {reason}")]
    UnsupportedParameter {
        alpha_inversed: u32,
        reason: &'static str,
    },

    #[error("{0} lanes are not available on this target")]
    BackendUnavailable(&'static str),

    #[error("thread count must be at least 1, got {0}")]
    InvalidThreadCount(usize),

    /// The OS refused to create a partition worker.
    #[error("failed to spawn blend worker {worker}: {source}")]
    WorkerSpawnFailed {
        worker: usize,
        #[source]
        source: io::Error,
    },

    #[error("blend worker {worker} panicked before finishing its range")]
    WorkerPanicked { worker: usize },

    #[error("failed to build the row worker pool: {0}")]
    PoolBuildFailed(#[from] rayon::ThreadPoolBuildError),
}

impl BlendError {
    pub(crate) fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            reason: reason.into(),
        }
    }
}

pub type BlendResult<T> = Result<T, BlendError>;
