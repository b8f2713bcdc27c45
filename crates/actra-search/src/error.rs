//! Search error model.

use actra_runtime::ProgramError;
use actra_solver::Guard;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// An assertion fired inside the program under test. `guard` is the
    /// triggering path condition.
    #[error("property violated: {message}")]
    PropertyViolation { message: String, guard: Guard },

    /// The step bound was hit with `fail_on_max_step_bound` set.
    #[error("scheduling step bound of {bound} reached")]
    StepBoundExceeded { bound: usize },

    /// The wall-clock deadline passed. The caller may checkpoint and
    /// re-enter through resume.
    #[error("search timed out after {elapsed_secs:.1}s")]
    Timeout { elapsed_secs: f64 },

    /// Cooperative cancellation between iterations.
    #[error("search interrupted")]
    Interrupted,

    /// Checkpoint file could not be read or written.
    #[error("checkpoint {}: {source}", .path.display())]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint file holds malformed data.
    #[error("checkpoint {}: {source}", .path.display())]
    CheckpointFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ProgramError> for SearchError {
    fn from(e: ProgramError) -> Self {
        match e {
            ProgramError::AssertionFailed { message, guard } => {
                SearchError::PropertyViolation { message, guard }
            }
            // the liveness hook runs between iterations, outside any
            // per-path guard
            ProgramError::LivenessViolated { message } => SearchError::PropertyViolation {
                message,
                guard: Guard::always(),
            },
        }
    }
}

pub type SearchResult<T> = Result<T, SearchError>;
