use crate::session::Phase;
use thiserror::Error;

/// Failures talking to the quiz/grading backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to grading backend failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend answered, but with a non-success envelope status.
    #[error("grading backend returned status {status:?}")]
    Backend { status: String },
}

/// Controller-boundary error taxonomy. None of these propagate as faults:
/// the controller converts each into a user-visible event before returning.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("quiz could not be loaded: {0}")]
    Load(#[source] ApiError),
    #[error("submission failed: {0}")]
    Submit(#[source] ApiError),
    #[error("no student identity available")]
    MissingIdentity,
    #[error("operation not allowed in phase {phase:?}")]
    InvalidPhase { phase: Phase },
}
