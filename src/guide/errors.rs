//! Guide orchestrator error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Hard failures surfaced to the caller of a guide run.
///
/// Refinement and evaluation failures never appear here: they degrade in
/// place and are reported on the status sink.
#[derive(Debug, Error)]
pub enum GuideError {
    /// Bad or missing input, detected before any network activity.
    #[error("{reason}")]
    Validation { reason: String },

    /// The backend never produced a candidate (fallback list exhausted, or
    /// the single-message provider call failed).
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl GuideError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        GuideError::Validation {
            reason: reason.into(),
        }
    }
}
