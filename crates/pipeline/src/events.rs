//! Progress events emitted while a generation job runs.

use chrono::Utc;
use reframe_core::generation::JobStatus;
use reframe_core::types::{JobId, Timestamp};
use serde::Serialize;
use tokio::sync::mpsc;

pub const MSG_SUBMITTING: &str = "Initializing video generation...";
pub const MSG_PROCESSING: &str =
    "AI is crafting your masterpiece. This can take several minutes...";
pub const MSG_CHECKING: &str = "Checking progress on your video...";
pub const MSG_DOWNLOADING: &str = "Video generated! Preparing for download...";
pub const MSG_SUCCEEDED: &str = "Your video is ready.";

/// Used when the remote job fails without saying why.
pub const DEFAULT_FAILURE_MESSAGE: &str = "An unknown error occurred during video generation.";

pub const MISSING_ASSET_MESSAGE: &str =
    "Video generation finished, but no video URL was found in the response.";

/// One state change of a generation job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Human-readable progress or failure text.
    pub message: String,
    pub timestamp: Timestamp,
}

impl GenerationEvent {
    pub fn new(job_id: JobId, status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            job_id,
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

pub type ProgressSender = mpsc::UnboundedSender<GenerationEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<GenerationEvent>;

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}
