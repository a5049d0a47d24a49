use reframe_core::error::CoreError;
use reframe_genai::api::GenAiApiError;

use crate::events::{DEFAULT_FAILURE_MESSAGE, MISSING_ASSET_MESSAGE};

/// Why a generation job did not produce a video.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The prompt was rejected before any remote call.
    #[error("{0}")]
    InvalidInput(String),

    /// The remote job finished with an error.
    #[error("{0}")]
    RemoteJobFailed(String),

    /// The remote job finished but referenced no asset.
    #[error("{}", MISSING_ASSET_MESSAGE)]
    MissingAsset,

    /// A submission, status check, or download did not succeed.
    #[error(transparent)]
    TransportError(#[from] GenAiApiError),

    /// The configured ceiling on status checks was reached.
    #[error("Video generation did not finish after {attempts} status checks.")]
    PollLimitExceeded { attempts: u32 },

    /// The caller cancelled the job.
    #[error("Video generation was cancelled.")]
    Cancelled,

    /// The job state machine refused a transition.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    /// Build a [`GenerationError::RemoteJobFailed`], substituting the
    /// default message when the remote one is blank.
    pub fn remote(message: &str) -> Self {
        if message.trim().is_empty() {
            Self::RemoteJobFailed(DEFAULT_FAILURE_MESSAGE.to_string())
        } else {
            Self::RemoteJobFailed(message.to_string())
        }
    }
}

impl From<CoreError> for GenerationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::InvalidInput(msg),
            other @ CoreError::InvalidTransition { .. } => Self::Internal(other.to_string()),
        }
    }
}
