//! Error types for the analysis engine.
//!
//! Every precondition violation of the engine is a typed variant here.
//! Nothing in the engine panics on bad input.

use thiserror::Error;

/// Errors surfaced by the registry, submission builder, dispatcher and history store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// A component asked for a domain id that was never registered.
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    /// The submission is missing a title or images.
    #[error("Submission not ready: {reason}")]
    NotReady { reason: String },

    /// A request is already in flight for this context.
    #[error("An analysis request is already in progress")]
    RequestInProgress,

    /// Image index outside the current sequence.
    #[error("Image index {index} out of range (submission has {len} images)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The analyzer backend failed, timed out or returned unusable data.
    #[error("Analysis backend error: {0}")]
    AnalysisBackend(String),

    /// A backend-reported score outside [0, 100].
    #[error("Invalid score reported by backend: {0}")]
    InvalidScore(i64),

    /// The request was abandoned before its result could be recorded.
    #[error("Analysis request was cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// Errors the user can fix by editing the submission.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, OrchestratorError::NotReady { .. })
    }

    /// A collision with work already in flight; the caller may ignore it.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrchestratorError::RequestInProgress)
    }

    /// Errors that indicate a bug in the calling code.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::DomainNotFound(_) | OrchestratorError::IndexOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_ready = OrchestratorError::NotReady {
            reason: "title is empty".to_string(),
        };
        assert!(not_ready.is_user_correctable());
        assert!(!not_ready.is_programming_error());

        assert!(OrchestratorError::RequestInProgress.is_transient());
        assert!(OrchestratorError::DomainNotFound("x".into()).is_programming_error());
        assert!(OrchestratorError::IndexOutOfRange { index: 0, len: 0 }.is_programming_error());
        assert!(!OrchestratorError::Cancelled.is_transient());
        assert!(!OrchestratorError::AnalysisBackend("timed out".into()).is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = OrchestratorError::IndexOutOfRange { index: 3, len: 1 };
        assert_eq!(
            err.to_string(),
            "Image index 3 out of range (submission has 1 images)"
        );
        assert_eq!(
            OrchestratorError::DomainNotFound("cars".into()).to_string(),
            "Domain not found: cars"
        );
    }
}
