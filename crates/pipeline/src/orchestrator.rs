//! Drives one remote video generation to completion.
//!
//! The job is submitted once, then checked on the [`PollPolicy`] schedule
//! until the remote side reports `done`.  A finished job is either failed
//! (remote error, or no asset referenced) or its first asset is
//! downloaded.  Every remote call and every delay races the
//! [`CancellationToken`]; a cancelled call is dropped mid-flight.

use std::future::Future;

use reframe_core::generation::{GenerationJob, JobStatus, PollPolicy};
use reframe_core::types::JobId;
use reframe_genai::backend::VideoGenerationBackend;
use reframe_genai::messages::OperationOutcome;
use tokio_util::sync::CancellationToken;

use crate::error::GenerationError;
use crate::events::{
    GenerationEvent, ProgressSender, MSG_CHECKING, MSG_DOWNLOADING, MSG_PROCESSING,
    MSG_SUBMITTING, MSG_SUCCEEDED,
};

/// A downloaded generation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub job_id: JobId,
    /// Remote reference the bytes were fetched from.
    pub asset_uri: String,
    pub bytes: Vec<u8>,
}

/// Run a generation job for `prompt` and return the produced video.
///
/// The prompt is validated before any remote call.  Progress is sent on
/// `progress`; a dropped receiver is ignored.  On failure a final
/// [`JobStatus::Failed`] event carries the error text.  Cancellation
/// returns [`GenerationError::Cancelled`] and emits nothing further.
pub async fn run_generation_job<B>(
    backend: &B,
    prompt: &str,
    policy: &PollPolicy,
    progress: &ProgressSender,
    cancel: &CancellationToken,
) -> Result<GeneratedVideo, GenerationError>
where
    B: VideoGenerationBackend + ?Sized,
{
    let job = GenerationJob::new(prompt)?;
    let mut run = JobRun { job, progress };

    tracing::info!(job_id = %run.job.id(), "Starting generation job");

    match drive(backend, &mut run, policy, cancel).await {
        Ok(video) => {
            tracing::info!(
                job_id = %video.job_id,
                bytes = video.bytes.len(),
                "Generation job succeeded",
            );
            Ok(video)
        }
        Err(GenerationError::Cancelled) => {
            tracing::info!(
                job_id = %run.job.id(),
                status = %run.job.status(),
                "Generation job cancelled",
            );
            Err(GenerationError::Cancelled)
        }
        Err(e) => {
            tracing::warn!(job_id = %run.job.id(), error = %e, "Generation job failed");
            let detail = e.to_string();
            if run.job.fail(detail.as_str()).is_ok() {
                run.emit(detail);
            }
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// The job being driven plus the channel its transitions are reported on.
struct JobRun<'a> {
    job: GenerationJob,
    progress: &'a ProgressSender,
}

impl JobRun<'_> {
    fn emit(&self, message: impl Into<String>) {
        let event = GenerationEvent::new(self.job.id(), self.job.status(), message);
        let _ = self.progress.send(event);
    }
}

async fn drive<B>(
    backend: &B,
    run: &mut JobRun<'_>,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<GeneratedVideo, GenerationError>
where
    B: VideoGenerationBackend + ?Sized,
{
    let job_id = run.job.id();
    run.emit(MSG_SUBMITTING);

    let mut operation = until_cancelled(cancel, backend.submit(run.job.prompt())).await??;
    tracing::debug!(job_id = %job_id, operation = %operation.name, "Job submitted");

    let mut delay = policy.interval;
    let asset_uri = loop {
        match operation.outcome() {
            OperationOutcome::Pending => {
                if run.job.status() == JobStatus::Submitted {
                    run.job.begin_polling()?;
                    run.emit(MSG_PROCESSING);
                }

                let attempt = run.job.poll_attempts() + 1;
                if !policy.allows_attempt(attempt) {
                    return Err(GenerationError::PollLimitExceeded {
                        attempts: run.job.poll_attempts(),
                    });
                }

                tracing::debug!(
                    job_id = %job_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Waiting before status check",
                );
                until_cancelled(cancel, tokio::time::sleep(delay)).await?;

                run.job.record_poll()?;
                run.emit(MSG_CHECKING);
                operation = until_cancelled(cancel, backend.poll(&operation)).await??;
                delay = policy.next_interval(delay);
            }
            OperationOutcome::Failed(message) => {
                return Err(GenerationError::remote(&message));
            }
            OperationOutcome::Completed { asset_uri: None } => {
                return Err(GenerationError::MissingAsset);
            }
            OperationOutcome::Completed {
                asset_uri: Some(uri),
            } => break uri,
        }
    };

    run.job.begin_fetch(asset_uri.as_str())?;
    run.emit(MSG_DOWNLOADING);

    let bytes = until_cancelled(cancel, backend.fetch_asset(&asset_uri)).await??;

    run.job.succeed()?;
    run.emit(MSG_SUCCEEDED);

    Ok(GeneratedVideo {
        job_id,
        asset_uri,
        bytes,
    })
}

/// Await `fut` unless `cancel` fires first, in which case `fut` is
/// dropped without being polled again.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, GenerationError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GenerationError::Cancelled),
        out = fut => Ok(out),
    }
}
